//! Built-in LUT presets.
//!
//! Tables are generated once on first access and shared for the life of
//! the process. Lookup is by id.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::lut::LutTable;
use crate::pixel::Rgb;

/// Grid size of every generated preset.
pub const PRESET_SIZE: usize = 17;

/// Contrast factor of the "high contrast" log conversion.
pub const HIGH_CONTRAST_FACTOR: f32 = 1.3;
/// Contrast factor of the flattened "soft" log conversion.
pub const SOFT_CONTRAST_FACTOR: f32 = 0.6;

/// Which slot of the stack a preset is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LutKind {
    Technical,
    Creative,
}

impl fmt::Display for LutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LutKind::Technical => write!(f, "technical"),
            LutKind::Creative => write!(f, "creative"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LutPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: LutKind,
    pub table: Arc<LutTable>,
}

static REGISTRY: OnceLock<Vec<LutPreset>> = OnceLock::new();

/// All built-in presets, technical first.
pub fn builtin_presets() -> &'static [LutPreset] {
    REGISTRY.get_or_init(build_registry)
}

/// Look up a preset by id.
pub fn preset(id: &str) -> Option<&'static LutPreset> {
    builtin_presets().iter().find(|p| p.id == id)
}

fn build_registry() -> Vec<LutPreset> {
    let log_to_709 = LutTable::from_fn(PRESET_SIZE, |c| c.map(log_to_display));

    let entries: Vec<(&'static str, &'static str, LutKind, LutTable)> = vec![
        (
            "identity",
            "Identity",
            LutKind::Technical,
            LutTable::identity(PRESET_SIZE),
        ),
        (
            "log-to-709-high-contrast",
            "Log to Rec.709 (High Contrast)",
            LutKind::Technical,
            log_to_709.with_contrast(HIGH_CONTRAST_FACTOR),
        ),
        (
            "log-to-709-soft",
            "Log to Rec.709 (Soft)",
            LutKind::Technical,
            log_to_709.with_contrast(SOFT_CONTRAST_FACTOR),
        ),
        ("log-to-709", "Log to Rec.709", LutKind::Technical, log_to_709),
        ("cinematic", "Cinematic", LutKind::Creative, generate(cinematic)),
        ("vintage", "Vintage", LutKind::Creative, generate(vintage)),
        ("natural", "Natural", LutKind::Creative, generate(natural)),
        ("bw-contrast", "B&W", LutKind::Creative, generate(bw_contrast)),
        ("muted", "Muted", LutKind::Creative, generate(muted)),
        ("vibrant", "Vibrant", LutKind::Creative, generate(vibrant)),
    ];

    let presets: Vec<LutPreset> = entries
        .into_iter()
        .map(|(id, name, kind, table)| LutPreset {
            id,
            name,
            kind,
            table: Arc::new(table.with_title(name)),
        })
        .collect();
    tracing::debug!(count = presets.len(), "Built-in LUT presets generated");
    presets
}

fn generate(look: fn(Rgb) -> Rgb) -> LutTable {
    LutTable::from_fn(PRESET_SIZE, |c| look(c).clamp01())
}

/// Log signal to Rec.709 display code value.
///
/// The log curve spends 0.1 of signal per stop over ten stops; the linear
/// result goes through the Rec.709 OETF.
fn log_to_display(v: f32) -> f32 {
    const STOPS: f32 = 10.0;
    let linear = (2.0f32.powf(v * STOPS) - 1.0) / (2.0f32.powf(STOPS) - 1.0);
    let encoded = if linear < 0.018 {
        4.5 * linear
    } else {
        1.099 * linear.powf(0.45) - 0.099
    };
    encoded.clamp(0.0, 1.0)
}

fn saturate(c: Rgb, k: f32) -> Rgb {
    let lum = c.luminance();
    c.map(|v| lum + (v - lum) * k)
}

fn contrast(c: Rgb, k: f32) -> Rgb {
    c.map(|v| (v - 0.5) * k + 0.5)
}

/// Teal shadows, warm highlights.
fn cinematic(c: Rgb) -> Rgb {
    let c = contrast(c, 1.1);
    let lum = c.luminance();
    let shadow = (1.0 - lum).powi(2);
    let highlight = lum * lum;
    Rgb::new(
        c.r - 0.05 * shadow + 0.06 * highlight,
        c.g + 0.01 * shadow + 0.02 * highlight,
        c.b + 0.06 * shadow - 0.05 * highlight,
    )
}

/// Faded blacks, warm cast, reduced saturation.
fn vintage(c: Rgb) -> Rgb {
    let c = saturate(c, 0.7);
    let faded = c.map(|v| 0.08 + v * 0.86);
    Rgb::new(faded.r + 0.03, faded.g + 0.01, faded.b - 0.04)
}

fn natural(c: Rgb) -> Rgb {
    saturate(contrast(c, 1.05), 1.05)
}

fn bw_contrast(c: Rgb) -> Rgb {
    contrast(Rgb::splat(c.luminance()), HIGH_CONTRAST_FACTOR)
}

fn muted(c: Rgb) -> Rgb {
    contrast(saturate(c, 0.6), 0.9)
}

fn vibrant(c: Rgb) -> Rgb {
    saturate(c, 1.3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_ids() {
        let ids: Vec<_> = builtin_presets().iter().map(|p| p.id).collect();
        for id in [
            "identity",
            "log-to-709",
            "log-to-709-high-contrast",
            "log-to-709-soft",
            "cinematic",
            "vintage",
            "natural",
            "bw-contrast",
            "muted",
            "vibrant",
        ] {
            assert!(ids.contains(&id), "missing preset {id}");
        }
        assert!(preset("nope").is_none());
    }

    #[test]
    fn test_registry_is_shared() {
        let a = preset("cinematic").unwrap();
        let b = preset("cinematic").unwrap();
        assert!(Arc::ptr_eq(&a.table, &b.table));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(preset("log-to-709").unwrap().kind, LutKind::Technical);
        assert_eq!(preset("vibrant").unwrap().kind, LutKind::Creative);
    }

    #[test]
    fn test_identity_preset_is_transparent() {
        let table = &preset("identity").unwrap().table;
        let px = Rgb::new(0.3, 0.5, 0.7);
        assert!(table.sample(px).max_abs_diff(px) < 1e-5);
    }

    #[test]
    fn test_log_curve_endpoints_and_monotonic() {
        assert_eq!(log_to_display(0.0), 0.0);
        assert!((log_to_display(1.0) - 1.0).abs() < 1e-5);
        let mut prev = -1.0;
        for i in 0..=100 {
            let v = log_to_display(i as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_bw_preset_is_gray() {
        let table = &preset("bw-contrast").unwrap().table;
        let out = table.sample(Rgb::new(0.9, 0.2, 0.4));
        assert!((out.r - out.g).abs() < 1e-5);
        assert!((out.g - out.b).abs() < 1e-5);
    }

    #[test]
    fn test_presets_are_in_range() {
        for p in builtin_presets() {
            assert_eq!(p.table.size(), PRESET_SIZE);
            assert_eq!(p.table.title(), Some(p.name));
            for c in p.table.cells() {
                assert!((0.0..=1.0).contains(&c.r), "{} out of range", p.id);
                assert!((0.0..=1.0).contains(&c.g));
                assert!((0.0..=1.0).contains(&c.b));
            }
        }
    }
}

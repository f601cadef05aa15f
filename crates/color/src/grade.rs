//! The color-science grade.
//!
//! Adjustments run in a fixed order: exposure, contrast, saturation,
//! vibrance, temperature, tint, highlights, shadows. The output is clamped
//! to `[0, 1]` per channel. Reordering the steps changes the result.

use crate::constants::*;
use crate::pixel::Rgb;
use crate::settings::ColorSettings;

/// Grade a single pixel.
///
/// Pure and deterministic. `settings` are expected to be clamped already
/// (see [`ColorSettings::clamped`]). Default settings return `pixel`
/// unchanged for any input in `[0, 1]^3`.
pub fn grade(pixel: Rgb, settings: &ColorSettings) -> Rgb {
    Grade::new(settings).apply(pixel)
}

/// A grade with its per-frame factors precomputed.
///
/// Controls left at zero are skipped entirely so the neutral grade is a
/// bit-exact identity rather than a round trip through float arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct Grade {
    exposure_gain: Option<f32>,
    contrast_factor: Option<f32>,
    saturation_factor: Option<f32>,
    vibrance_amount: Option<f32>,
    temperature_shift: Option<f32>,
    tint_shift: Option<f32>,
    highlights_offset: Option<f32>,
    shadows_offset: Option<f32>,
}

impl Grade {
    pub fn new(settings: &ColorSettings) -> Self {
        let active = |v: f32| if v != 0.0 { Some(v) } else { None };
        Self {
            exposure_gain: active(settings.exposure)
                .map(|ev| 2.0f32.powf(ev * EXPOSURE_SENSITIVITY)),
            contrast_factor: active(settings.contrast).map(|c| 1.0 + c / 100.0),
            saturation_factor: active(settings.saturation).map(|s| 1.0 + s / 100.0),
            vibrance_amount: active(settings.vibrance).map(|v| v / 100.0),
            temperature_shift: active(settings.temperature).map(|t| t / 100.0),
            tint_shift: active(settings.tint).map(|t| t / 100.0),
            highlights_offset: active(settings.highlights)
                .map(|h| h / 100.0 * HIGHLIGHTS_STRENGTH * HIGHLIGHTS_GAIN),
            shadows_offset: active(settings.shadows)
                .map(|s| s / 100.0 * SHADOWS_STRENGTH * SHADOWS_GAIN),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.exposure_gain.is_none()
            && self.contrast_factor.is_none()
            && self.saturation_factor.is_none()
            && self.vibrance_amount.is_none()
            && self.temperature_shift.is_none()
            && self.tint_shift.is_none()
            && self.highlights_offset.is_none()
            && self.shadows_offset.is_none()
    }

    pub fn apply(&self, pixel: Rgb) -> Rgb {
        let mut c = pixel;

        if let Some(gain) = self.exposure_gain {
            c = c * gain;
        }

        if let Some(k) = self.contrast_factor {
            c = c.map(|v| (v - 0.5) * k + 0.5);
        }

        if let Some(k) = self.saturation_factor {
            let lum = c.luminance();
            c = c.map(|v| lum + (v - lum) * k);
        }

        if let Some(amount) = self.vibrance_amount {
            let lum = c.luminance();
            let sat = (c - Rgb::splat(lum)).length();
            let k = 1.0 + amount * (1.0 - sat);
            c = c.map(|v| lum + (v - lum) * k);
        }

        if let Some(shift) = self.temperature_shift {
            c.r += shift * TEMPERATURE_SHIFT;
            c.b -= shift * TEMPERATURE_SHIFT;
        }

        if let Some(shift) = self.tint_shift {
            c.g -= shift * TINT_GREEN_SHIFT;
            c.r += shift * TINT_MAGENTA_SHIFT;
            c.b += shift * TINT_MAGENTA_SHIFT;
        }

        if let Some(offset) = self.highlights_offset {
            let mask = smoothstep(HIGHLIGHTS_MASK_LOW, HIGHLIGHTS_MASK_HIGH, c.luminance());
            c = c.map(|v| v + mask * offset);
        }

        if let Some(offset) = self.shadows_offset {
            let mask = 1.0 - smoothstep(SHADOWS_MASK_LOW, SHADOWS_MASK_HIGH, c.luminance());
            c = c.map(|v| v + mask * offset);
        }

        c.clamp01()
    }
}

/// Hermite smoothstep, matching GLSL `smoothstep`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(f: impl FnOnce(&mut ColorSettings)) -> ColorSettings {
        let mut s = ColorSettings::default();
        f(&mut s);
        s
    }

    #[test]
    fn test_default_is_identity() {
        let px = Rgb::new(0.1, 0.42, 0.93);
        assert_eq!(grade(px, &ColorSettings::default()), px);
        assert!(Grade::new(&ColorSettings::default()).is_identity());
    }

    #[test]
    fn test_exposure_one_stop() {
        let out = grade(Rgb::splat(0.5), &with(|s| s.exposure = 1.0));
        let expected = 0.5 * 2.0f32.powf(0.13);
        assert!((out.r - expected).abs() < 1e-3);
        assert!((out.r - 0.547).abs() < 1e-3);
        assert_eq!(out.r, out.g);
        assert_eq!(out.g, out.b);
    }

    #[test]
    fn test_contrast_pivots_on_mid_gray() {
        let s = with(|s| s.contrast = 50.0);
        assert!((grade(Rgb::splat(0.5), &s).r - 0.5).abs() < 1e-6);
        assert!((grade(Rgb::splat(0.7), &s).r - 0.8).abs() < 1e-6);
        assert!((grade(Rgb::splat(0.3), &s).r - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_full_desaturation_yields_gray() {
        let out = grade(Rgb::new(0.8, 0.2, 0.4), &with(|s| s.saturation = -100.0));
        assert!((out.r - out.g).abs() < 1e-6);
        assert!((out.g - out.b).abs() < 1e-6);
    }

    #[test]
    fn test_vibrance_moves_muted_colors_more() {
        let s = with(|s| s.vibrance = 50.0);
        let muted = Rgb::new(0.55, 0.5, 0.5);
        let vivid = Rgb::new(0.9, 0.2, 0.2);
        let relative_shift = |px: Rgb| {
            (grade(px, &s) - px).length() / (px - Rgb::splat(px.luminance())).length()
        };
        assert!(relative_shift(muted) > relative_shift(vivid));
    }

    #[test]
    fn test_temperature_and_tint_shift_channels() {
        let warm = grade(Rgb::splat(0.5), &with(|s| s.temperature = 100.0));
        assert!((warm.r - 0.6).abs() < 1e-6);
        assert!((warm.g - 0.5).abs() < 1e-6);
        assert!((warm.b - 0.4).abs() < 1e-6);

        let magenta = grade(Rgb::splat(0.5), &with(|s| s.tint = 100.0));
        assert!((magenta.r - 0.55).abs() < 1e-6);
        assert!((magenta.g - 0.4).abs() < 1e-6);
        assert!((magenta.b - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_highlights_leave_deep_shadows_alone() {
        let s = with(|s| s.highlights = 100.0);
        let dark = Rgb::splat(0.1);
        assert_eq!(grade(dark, &s), dark);
        let bright = grade(Rgb::splat(0.8), &s);
        assert!(bright.r > 0.8);
    }

    #[test]
    fn test_shadows_leave_highlights_alone() {
        let s = with(|s| s.shadows = 100.0);
        let bright = Rgb::splat(0.7);
        assert_eq!(grade(bright, &s), bright);
        // mask = 1 at black, offset = 0.5 * 0.1
        assert!((grade(Rgb::BLACK, &s).r - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_output_is_clamped() {
        let s = with(|s| {
            s.exposure = 2.0;
            s.contrast = 100.0;
            s.highlights = 100.0;
        });
        let out = grade(Rgb::new(0.9, 0.95, 1.0), &s);
        assert_eq!(out, Rgb::WHITE);
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.2, 1.0, 0.1), 0.0);
        assert_eq!(smoothstep(0.2, 1.0, 1.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }
}

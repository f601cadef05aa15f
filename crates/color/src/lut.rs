//! 3D LUT tables: `.cube` parsing, trilinear sampling, and blending.
//!
//! A table is a cubic grid of side `N` stored with the red axis varying
//! fastest, then green, then blue. `N` is fixed when the table is built.

use std::fmt::Write as _;

use lumagrade_common::error::LumaError;

use crate::constants::INTENSITY_RANGE;
use crate::pixel::Rgb;

/// Errors produced while parsing a `.cube` asset.
///
/// Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LutParseError {
    #[error("missing LUT_3D_SIZE directive")]
    MissingSize,

    #[error("line {line}: invalid LUT_3D_SIZE '{value}' (expected an integer in 2..=256)")]
    InvalidSize { line: usize, value: String },

    #[error("line {line}: duplicate LUT_3D_SIZE directive")]
    DuplicateSize { line: usize },

    #[error("line {line}: 1D LUTs are not supported")]
    Unsupported1d { line: usize },

    #[error("line {line}: expected 3 values, found {found}")]
    WrongArity { line: usize, found: usize },

    #[error("line {line}: non-numeric value '{token}'")]
    NonNumeric { line: usize, token: String },

    #[error("line {line}: non-finite value '{token}'")]
    NonFinite { line: usize, token: String },

    #[error("expected {expected} data rows for LUT_3D_SIZE {size}, found {found}")]
    RowCount {
        size: usize,
        expected: usize,
        found: usize,
    },
}

impl From<LutParseError> for LumaError {
    fn from(err: LutParseError) -> Self {
        LumaError::lut_parse(err.to_string())
    }
}

/// A cubic 3D lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct LutTable {
    size: usize,
    data: Vec<Rgb>,
    title: Option<String>,
}

impl LutTable {
    pub const MIN_SIZE: usize = 2;
    pub const MAX_SIZE: usize = 256;

    /// Build a table from cells in R-fastest order.
    pub fn from_cells(size: usize, data: Vec<Rgb>) -> Result<Self, LutParseError> {
        if !(Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size) {
            return Err(LutParseError::InvalidSize {
                line: 0,
                value: size.to_string(),
            });
        }
        let expected = size * size * size;
        if data.len() != expected {
            return Err(LutParseError::RowCount {
                size,
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            size,
            data,
            title: None,
        })
    }

    /// Build a table by evaluating `f` at every grid coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `size` is outside `MIN_SIZE..=MAX_SIZE`.
    pub fn from_fn(size: usize, f: impl Fn(Rgb) -> Rgb) -> Self {
        assert!(
            (Self::MIN_SIZE..=Self::MAX_SIZE).contains(&size),
            "LUT size {size} out of range"
        );
        let max = (size - 1) as f32;
        let mut data = Vec::with_capacity(size * size * size);
        for b in 0..size {
            for g in 0..size {
                for r in 0..size {
                    let coord = Rgb::new(r as f32 / max, g as f32 / max, b as f32 / max);
                    data.push(f(coord));
                }
            }
        }
        Self {
            size,
            data,
            title: None,
        }
    }

    /// Table whose every cell equals its own grid coordinate.
    pub fn identity(size: usize) -> Self {
        Self::from_fn(size, |c| c)
    }

    /// Parse `.cube` text.
    ///
    /// `#` comments, blank lines, `TITLE` and `DOMAIN_*` lines are skipped.
    /// Every other line must be `LUT_3D_SIZE N` or three floats. The number
    /// of data rows must equal `N^3` exactly; short or long files are rejected.
    pub fn parse(content: &str) -> Result<Self, LutParseError> {
        let mut size: Option<usize> = None;
        let mut title = None;
        let mut data = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut tokens = trimmed.split_whitespace();
            let Some(first) = tokens.next() else {
                continue;
            };

            match first {
                "TITLE" => {
                    let rest = trimmed["TITLE".len()..].trim().trim_matches('"');
                    title = Some(rest.to_string());
                    continue;
                }
                "LUT_3D_SIZE" => {
                    if size.is_some() {
                        return Err(LutParseError::DuplicateSize { line });
                    }
                    let value = tokens.collect::<Vec<_>>().join(" ");
                    let parsed = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| (Self::MIN_SIZE..=Self::MAX_SIZE).contains(n))
                        .ok_or(LutParseError::InvalidSize { line, value })?;
                    size = Some(parsed);
                    continue;
                }
                "LUT_1D_SIZE" => return Err(LutParseError::Unsupported1d { line }),
                keyword if keyword.starts_with("DOMAIN_") => continue,
                _ => {}
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 3 {
                return Err(LutParseError::WrongArity {
                    line,
                    found: fields.len(),
                });
            }
            let mut values = [0.0f32; 3];
            for (slot, token) in values.iter_mut().zip(&fields) {
                let v = token
                    .parse::<f32>()
                    .map_err(|_| LutParseError::NonNumeric {
                        line,
                        token: token.to_string(),
                    })?;
                if !v.is_finite() {
                    return Err(LutParseError::NonFinite {
                        line,
                        token: token.to_string(),
                    });
                }
                *slot = v;
            }
            data.push(Rgb::new(values[0], values[1], values[2]));
        }

        let size = size.ok_or(LutParseError::MissingSize)?;
        let mut table = Self::from_cells(size, data)?;
        table.title = title;
        tracing::debug!(size, title = ?table.title, "Parsed 3D LUT");
        Ok(table)
    }

    /// Grid side length `N`.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Cells in R-fastest order.
    pub fn cells(&self) -> &[Rgb] {
        &self.data
    }

    /// Cell at grid index `(r, g, b)`.
    pub fn cell(&self, r: usize, g: usize, b: usize) -> Rgb {
        self.data[r + g * self.size + b * self.size * self.size]
    }

    /// Trilinear lookup.
    ///
    /// Each channel is scaled to `[0, N-1]`; the 8 surrounding cells are
    /// interpolated along R, then G, then B. Output is clamped to `[0, 1]`.
    pub fn sample(&self, pixel: Rgb) -> Rgb {
        let max = (self.size - 1) as f32;
        let (r0, r1, fr) = axis(pixel.r, max);
        let (g0, g1, fg) = axis(pixel.g, max);
        let (b0, b1, fb) = axis(pixel.b, max);

        let c00 = self.cell(r0, g0, b0).lerp(self.cell(r1, g0, b0), fr);
        let c10 = self.cell(r0, g1, b0).lerp(self.cell(r1, g1, b0), fr);
        let c01 = self.cell(r0, g0, b1).lerp(self.cell(r1, g0, b1), fr);
        let c11 = self.cell(r0, g1, b1).lerp(self.cell(r1, g1, b1), fr);

        let c0 = c00.lerp(c10, fg);
        let c1 = c01.lerp(c11, fg);

        c0.lerp(c1, fb).clamp01()
    }

    /// Blend between `pixel` and its lookup by `intensity` in `[0, 100]`.
    ///
    /// Intensity 0 returns `pixel` unchanged; 100 returns the raw sample.
    pub fn apply(&self, intensity: f32, pixel: Rgb) -> Rgb {
        blend(Some(self), intensity, pixel)
    }

    /// Derive a new table by transforming every cell.
    pub fn map_channels(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            size: self.size,
            data: self.data.iter().map(|c| c.map(&f)).collect(),
            title: self.title.clone(),
        }
    }

    /// Apply `(v - 0.5) * factor + 0.5` to every cell, clamped to `[0, 1]`.
    ///
    /// Factors above 1 steepen the look, below 1 flatten it.
    pub fn with_contrast(&self, factor: f32) -> Self {
        self.map_channels(|v| ((v - 0.5) * factor + 0.5).clamp(0.0, 1.0))
    }

    /// Serialize as `.cube` text with 6-decimal rows.
    pub fn to_cube_string(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 28 + 128);
        if let Some(title) = &self.title {
            let _ = writeln!(out, "TITLE \"{title}\"");
        }
        let _ = writeln!(out, "LUT_3D_SIZE {}", self.size);
        let _ = writeln!(out, "DOMAIN_MIN 0.0 0.0 0.0");
        let _ = writeln!(out, "DOMAIN_MAX 1.0 1.0 1.0");
        for c in &self.data {
            let _ = writeln!(out, "{:.6} {:.6} {:.6}", c.r, c.g, c.b);
        }
        out
    }

    /// Cells as RGBA floats for upload as a 3D texture (alpha = 1).
    pub fn to_rgba_texels(&self) -> Vec<f32> {
        let mut texels = Vec::with_capacity(self.data.len() * 4);
        for c in &self.data {
            texels.extend_from_slice(&[c.r, c.g, c.b, 1.0]);
        }
        texels
    }
}

/// Blend `pixel` toward the lookup in `table` by `intensity` in `[0, 100]`.
///
/// A missing table or zero intensity is a bypass and returns `pixel`
/// exactly.
pub fn blend(table: Option<&LutTable>, intensity: f32, pixel: Rgb) -> Rgb {
    let (lo, hi) = INTENSITY_RANGE;
    let t = intensity.clamp(lo, hi) / hi;
    let Some(table) = table else {
        return pixel;
    };
    if t.is_nan() || t <= 0.0 {
        return pixel;
    }
    let sampled = table.sample(pixel);
    if t >= 1.0 {
        return sampled;
    }
    pixel.lerp(sampled, t)
}

/// Floor index, ceil index, and fraction along one axis.
fn axis(v: f32, max: f32) -> (usize, usize, f32) {
    let x = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) * max };
    let lo = x.floor();
    let hi = x.ceil().min(max);
    (lo as usize, hi as usize, x - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_2: &str = "\
# identity
TITLE \"Identity 2\"
DOMAIN_MIN 0.0 0.0 0.0
DOMAIN_MAX 1.0 1.0 1.0
LUT_3D_SIZE 2

0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
1.0 1.0 0.0
0.0 0.0 1.0
1.0 0.0 1.0
0.0 1.0 1.0
1.0 1.0 1.0
";

    #[test]
    fn test_parse_identity() {
        let table = LutTable::parse(IDENTITY_2).unwrap();
        assert_eq!(table.size(), 2);
        assert_eq!(table.title(), Some("Identity 2"));
        assert_eq!(table.cell(1, 0, 0), Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(table.cell(0, 1, 0), Rgb::new(0.0, 1.0, 0.0));
        assert_eq!(table.cell(0, 0, 1), Rgb::new(0.0, 0.0, 1.0));
        assert_eq!(table, LutTable::identity(2).with_title("Identity 2"));
    }

    #[test]
    fn test_identity_sampling_is_transparent() {
        let table = LutTable::parse(IDENTITY_2).unwrap();
        for px in [
            Rgb::new(0.0, 0.0, 0.0),
            Rgb::new(0.25, 0.5, 0.75),
            Rgb::new(0.9, 0.1, 0.33),
            Rgb::new(1.0, 1.0, 1.0),
        ] {
            assert!(table.sample(px).max_abs_diff(px) < 1e-6);
        }
    }

    #[test]
    fn test_identity_17_is_transparent() {
        let table = LutTable::identity(17);
        let px = Rgb::new(0.123, 0.456, 0.789);
        assert!(table.sample(px).max_abs_diff(px) < 1e-5);
    }

    #[test]
    fn test_sample_interpolates_along_red_first() {
        // Only the red axis varies: output red = input red squared at the grid points.
        let table = LutTable::from_fn(3, |c| Rgb::new(c.r * c.r, 0.0, 0.0));
        let out = table.sample(Rgb::new(0.75, 0.0, 0.0));
        // grid points r=0.5 -> 0.25, r=1.0 -> 1.0, halfway between.
        assert!((out.r - 0.625).abs() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_out_of_range_input() {
        let table = LutTable::identity(5);
        assert_eq!(table.sample(Rgb::new(-1.0, 2.0, 0.5)), Rgb::new(0.0, 1.0, 0.5));
    }

    #[test]
    fn test_blend_laws() {
        let table = LutTable::identity(4).with_contrast(1.5);
        let px = Rgb::new(0.2, 0.6, 0.9);
        assert_eq!(table.apply(0.0, px), px);
        assert_eq!(table.apply(100.0, px), table.sample(px));
        assert_eq!(blend(None, 100.0, px), px);
        let half = table.apply(50.0, px);
        let full = table.sample(px);
        assert!((half.r - (px.r + full.r) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_short_file() {
        let mut text = String::from("LUT_3D_SIZE 4\n");
        for _ in 0..10 {
            text.push_str("0.5 0.5 0.5\n");
        }
        assert_eq!(
            LutTable::parse(&text),
            Err(LutParseError::RowCount {
                size: 4,
                expected: 64,
                found: 10
            })
        );
    }

    #[test]
    fn test_rejects_long_file() {
        let mut text = LutTable::identity(2).to_cube_string();
        text.push_str("0.1 0.2 0.3\n");
        assert!(matches!(
            LutTable::parse(&text),
            Err(LutParseError::RowCount { found: 9, .. })
        ));
    }

    #[test]
    fn test_rejects_missing_size() {
        assert_eq!(
            LutTable::parse("0 0 0\n1 1 1\n"),
            Err(LutParseError::MissingSize)
        );
    }

    #[test]
    fn test_rejects_malformed_rows() {
        assert_eq!(
            LutTable::parse("LUT_3D_SIZE 2\n0.0 0.0\n"),
            Err(LutParseError::WrongArity { line: 2, found: 2 })
        );
        assert_eq!(
            LutTable::parse("LUT_3D_SIZE 2\n0.0 abc 0.0\n"),
            Err(LutParseError::NonNumeric {
                line: 2,
                token: "abc".to_string()
            })
        );
        assert!(matches!(
            LutTable::parse("LUT_3D_SIZE 2\n0.0 NaN 0.0\n"),
            Err(LutParseError::NonFinite { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_size_directives() {
        assert!(matches!(
            LutTable::parse("LUT_3D_SIZE 1\n"),
            Err(LutParseError::InvalidSize { line: 1, .. })
        ));
        assert!(matches!(
            LutTable::parse("LUT_3D_SIZE two\n"),
            Err(LutParseError::InvalidSize { .. })
        ));
        assert_eq!(
            LutTable::parse("LUT_3D_SIZE 2\nLUT_3D_SIZE 2\n"),
            Err(LutParseError::DuplicateSize { line: 2 })
        );
        assert_eq!(
            LutTable::parse("LUT_1D_SIZE 1024\n"),
            Err(LutParseError::Unsupported1d { line: 1 })
        );
    }

    #[test]
    fn test_cube_string_reparses() {
        let table = LutTable::identity(3).with_contrast(1.3).with_title("High Contrast");
        let reparsed = LutTable::parse(&table.to_cube_string()).unwrap();
        assert_eq!(reparsed.size(), 3);
        assert_eq!(reparsed.title(), Some("High Contrast"));
        for (a, b) in reparsed.cells().iter().zip(table.cells()) {
            assert!(a.max_abs_diff(*b) < 1e-6);
        }
    }

    #[test]
    fn test_contrast_derivation_clamps() {
        let steep = LutTable::identity(2).with_contrast(1.3);
        assert_eq!(steep.cell(0, 0, 0), Rgb::BLACK);
        assert_eq!(steep.cell(1, 1, 1), Rgb::WHITE);
        let soft = LutTable::identity(2).with_contrast(0.6);
        assert!((soft.cell(0, 0, 0).r - 0.2).abs() < 1e-6);
        assert!((soft.cell(1, 1, 1).r - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_rgba_texels() {
        let texels = LutTable::identity(2).to_rgba_texels();
        assert_eq!(texels.len(), 8 * 4);
        assert_eq!(&texels[4..8], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_parse_error_converts() {
        let err: LumaError = LutParseError::MissingSize.into();
        assert!(matches!(err, LumaError::LutParse { .. }));
    }
}

//! Grade settings.

use serde::{Deserialize, Serialize};

use crate::constants::{EXPOSURE_RANGE, PERCENT_RANGE};

/// The eight grading controls.
///
/// Exposure is in stops `[-2, 2]`; every other control is a percentage
/// in `[-100, 100]`. All zero is the identity grade.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColorSettings {
    pub exposure: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub vibrance: f32,
    pub temperature: f32,
    pub tint: f32,
    pub highlights: f32,
    pub shadows: f32,
}

impl ColorSettings {
    /// Clamp every control into its documented range.
    ///
    /// This is the only place out-of-range values are handled; the grade
    /// itself assumes clamped input. Non-finite values become 0.
    pub fn clamped(&self) -> Self {
        let (emin, emax) = EXPOSURE_RANGE;
        let (pmin, pmax) = PERCENT_RANGE;
        let pct = |v: f32| finite_or_zero(v).clamp(pmin, pmax);
        Self {
            exposure: finite_or_zero(self.exposure).clamp(emin, emax),
            contrast: pct(self.contrast),
            saturation: pct(self.saturation),
            vibrance: pct(self.vibrance),
            temperature: pct(self.temperature),
            tint: pct(self.tint),
            highlights: pct(self.highlights),
            shadows: pct(self.shadows),
        }
    }

    /// Whether every control is at its neutral value.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_limits_each_control() {
        let wild = ColorSettings {
            exposure: 5.0,
            contrast: -250.0,
            saturation: 101.0,
            vibrance: f32::NAN,
            temperature: 40.0,
            tint: -100.0,
            highlights: 1000.0,
            shadows: f32::INFINITY,
        };
        let c = wild.clamped();
        assert_eq!(c.exposure, 2.0);
        assert_eq!(c.contrast, -100.0);
        assert_eq!(c.saturation, 100.0);
        assert_eq!(c.vibrance, 0.0);
        assert_eq!(c.temperature, 40.0);
        assert_eq!(c.tint, -100.0);
        assert_eq!(c.highlights, 100.0);
        assert_eq!(c.shadows, 0.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: ColorSettings = serde_json::from_str(r#"{"exposure": 1.0, "tint": -20}"#).unwrap();
        assert_eq!(s.exposure, 1.0);
        assert_eq!(s.tint, -20.0);
        assert_eq!(s.contrast, 0.0);
        assert!(!s.is_identity());
        assert!(ColorSettings::default().is_identity());
    }
}

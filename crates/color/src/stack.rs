//! The dual-LUT pipeline.
//!
//! Every frame, preview or export, goes through the same order:
//! technical LUT, then the grade, then the creative LUT.

use std::sync::Arc;

use image::RgbaImage;

use crate::grade::Grade;
use crate::lut::{blend, LutTable};
use crate::pixel::Rgb;
use crate::settings::ColorSettings;

/// One LUT slot: an optional table and its blend intensity in `[0, 100]`.
///
/// Tables are shared read-only; cloning a stage is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct LutStage {
    pub table: Option<Arc<LutTable>>,
    pub intensity: f32,
}

impl Default for LutStage {
    fn default() -> Self {
        Self {
            table: None,
            intensity: 100.0,
        }
    }
}

impl LutStage {
    pub fn new(table: Arc<LutTable>, intensity: f32) -> Self {
        Self {
            table: Some(table),
            intensity,
        }
    }

    /// A stage that passes pixels through.
    pub fn bypass() -> Self {
        Self::default()
    }

    /// True when the stage cannot change a pixel.
    pub fn is_bypass(&self) -> bool {
        self.table.is_none() || self.intensity.is_nan() || self.intensity <= 0.0
    }

    pub fn apply(&self, pixel: Rgb) -> Rgb {
        blend(self.table.as_deref(), self.intensity, pixel)
    }
}

/// Technical and creative LUT stages around the grade.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LutStack {
    pub technical: LutStage,
    pub creative: LutStage,
}

impl LutStack {
    pub fn new(technical: LutStage, creative: LutStage) -> Self {
        Self {
            technical,
            creative,
        }
    }

    /// Run one pixel through technical LUT, grade, creative LUT.
    pub fn apply_pixel(&self, pixel: Rgb, settings: &ColorSettings) -> Rgb {
        self.apply_with(&Grade::new(settings), pixel)
    }

    fn apply_with(&self, grade: &Grade, pixel: Rgb) -> Rgb {
        let technical = self.technical.apply(pixel);
        let graded = grade.apply(technical);
        self.creative.apply(graded)
    }

    /// Whether the pipeline is a no-op for these settings.
    pub fn is_identity(&self, settings: &ColorSettings) -> bool {
        self.technical.is_bypass() && self.creative.is_bypass() && settings.is_identity()
    }

    /// Apply the pipeline in place to an interleaved RGBA8 buffer.
    ///
    /// Alpha is left untouched.
    pub fn apply_rgba8(&self, image: &mut RgbaImage, settings: &ColorSettings) {
        if self.is_identity(settings) {
            return;
        }
        let grade = Grade::new(settings);
        for px in image.pixels_mut() {
            let [r, g, b, _] = px.0;
            let out = self.apply_with(&grade, Rgb::from_rgb8(r, g, b)).to_rgb8();
            px.0[..3].copy_from_slice(&out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invert() -> Arc<LutTable> {
        Arc::new(LutTable::from_fn(2, |c| Rgb::new(1.0 - c.r, 1.0 - c.g, 1.0 - c.b)))
    }

    fn half() -> Arc<LutTable> {
        Arc::new(LutTable::from_fn(2, |c| c * 0.5))
    }

    #[test]
    fn test_empty_stack_is_identity() {
        let stack = LutStack::default();
        let px = Rgb::new(0.3, 0.6, 0.9);
        assert_eq!(stack.apply_pixel(px, &ColorSettings::default()), px);
        assert!(stack.is_identity(&ColorSettings::default()));
    }

    #[test]
    fn test_technical_runs_before_creative() {
        // invert then halve differs from halve then invert
        let stack = LutStack::new(LutStage::new(invert(), 100.0), LutStage::new(half(), 100.0));
        let out = stack.apply_pixel(Rgb::splat(0.2), &ColorSettings::default());
        assert!((out.r - 0.4).abs() < 1e-6);

        let swapped = LutStack::new(LutStage::new(half(), 100.0), LutStage::new(invert(), 100.0));
        let out = swapped.apply_pixel(Rgb::splat(0.2), &ColorSettings::default());
        assert!((out.r - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_grade_sits_between_luts() {
        let settings = ColorSettings {
            temperature: 100.0,
            ..Default::default()
        };
        let stack = LutStack::new(LutStage::bypass(), LutStage::new(invert(), 100.0));
        let out = stack.apply_pixel(Rgb::splat(0.5), &settings);
        // warm shift (+0.1 red, -0.1 blue) then inversion
        assert!((out.r - 0.4).abs() < 1e-6);
        assert!((out.b - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_zero_intensity_stage_is_bypass() {
        let stage = LutStage::new(invert(), 0.0);
        assert!(stage.is_bypass());
        let px = Rgb::new(0.1, 0.2, 0.3);
        assert_eq!(stage.apply(px), px);
    }

    #[test]
    fn test_apply_rgba8_preserves_alpha() {
        let mut img = RgbaImage::from_pixel(2, 2, image::Rgba([51, 102, 204, 77]));
        let stack = LutStack::new(LutStage::new(invert(), 100.0), LutStage::bypass());
        stack.apply_rgba8(&mut img, &ColorSettings::default());
        for px in img.pixels() {
            assert_eq!(px.0, [204, 153, 51, 77]);
        }
    }

    #[test]
    fn test_apply_rgba8_identity_leaves_buffer() {
        let mut img = RgbaImage::from_pixel(3, 1, image::Rgba([1, 2, 3, 4]));
        let before = img.clone();
        LutStack::default().apply_rgba8(&mut img, &ColorSettings::default());
        assert_eq!(img, before);
    }
}

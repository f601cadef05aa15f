//! Frames moving through the export pipeline.

use image::RgbaImage;

/// One output frame.
///
/// Produced by a frame source and owned by whichever stage holds it;
/// dropped once the encoder has consumed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Interleaved RGBA8 pixels.
    pub pixels: RgbaImage,

    /// Presentation time from the start of the source.
    pub timestamp_micros: i64,

    pub duration_micros: i64,
}

impl Frame {
    pub fn new(pixels: RgbaImage, timestamp_micros: i64, duration_micros: i64) -> Self {
        Self {
            pixels,
            timestamp_micros,
            duration_micros,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

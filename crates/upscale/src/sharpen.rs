//! Post-upscale sharpening.

use image::RgbaImage;

/// 3x3 cross sharpen: `center * (1 + 4k) - k * (up + down + left + right)`.
///
/// Applied to RGB; alpha is copied. The one-pixel border is copied from
/// the input unchanged. Images under 3x3 are returned as is.
pub fn sharpen(image: &RgbaImage, strength: f32) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 || strength == 0.0 {
        return out;
    }
    let center_weight = 1.0 + 4.0 * strength;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = image.get_pixel(x, y).0;
            let up = image.get_pixel(x, y - 1).0;
            let down = image.get_pixel(x, y + 1).0;
            let left = image.get_pixel(x - 1, y).0;
            let right = image.get_pixel(x + 1, y).0;
            let px = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let neighbors = up[c] as f32 + down[c] as f32 + left[c] as f32 + right[c] as f32;
                let v = center[c] as f32 * center_weight - strength * neighbors;
                px.0[c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

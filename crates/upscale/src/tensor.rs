//! NCHW tensor marshaling.
//!
//! Frames enter the model as `[1, 3, H, W]` float planes normalized to
//! `[0, 1]`, alpha dropped. Output comes back the same way and is packed
//! into RGBA8 with alpha forced opaque.

use image::{Rgba, RgbaImage};

use crate::error::InferenceError;

const CHANNELS: usize = 3;

/// A dense float tensor with a 4-D `[N, C, H, W]` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::DataLength {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Height and width of the planes.
    pub fn spatial(&self) -> (usize, usize) {
        (self.shape[2], self.shape[3])
    }
}

/// Interleaved RGBA8 to planar `[1, 3, H, W]` floats in `[0, 1]`.
pub fn rgba_to_nchw(image: &RgbaImage) -> Tensor {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let plane = w * h;
    let mut data = vec![0.0f32; CHANNELS * plane];
    for (i, px) in image.pixels().enumerate() {
        for c in 0..CHANNELS {
            data[c * plane + i] = px.0[c] as f32 / 255.0;
        }
    }
    Tensor {
        shape: [1, CHANNELS, h, w],
        data,
    }
}

/// Planar `[1, 3, H, W]` floats back to RGBA8, alpha 255.
///
/// Values are scaled by 255, rounded and clamped.
pub fn nchw_to_rgba(tensor: &Tensor, width: u32, height: u32) -> Result<RgbaImage, InferenceError> {
    let expected = [1, CHANNELS, height as usize, width as usize];
    if tensor.shape != expected {
        return Err(InferenceError::ShapeMismatch {
            expected,
            found: tensor.shape,
        });
    }
    let plane = (width as usize) * (height as usize);
    let data = &tensor.data;
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let i = y as usize * width as usize + x as usize;
        Rgba([
            to_u8(data[i]),
            to_u8(data[plane + i]),
            to_u8(data[2 * plane + i]),
            255,
        ])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_channel_major() {
        // 2x1 image: red then blue
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 10])
            } else {
                Rgba([0, 0, 255, 20])
            }
        });
        let t = rgba_to_nchw(&img);
        assert_eq!(t.shape(), [1, 3, 1, 2]);
        assert_eq!(t.data(), &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_unmarshal_forces_alpha() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([12, 34, 56, 0]));
        let back = nchw_to_rgba(&rgba_to_nchw(&img), 3, 2).unwrap();
        for px in back.pixels() {
            assert_eq!(px.0, [12, 34, 56, 255]);
        }
    }

    #[test]
    fn test_unmarshal_clamps() {
        let t = Tensor::new([1, 3, 1, 1], vec![-0.5, 0.5, 1.7]).unwrap();
        let img = nchw_to_rgba(&t, 1, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 128, 255, 255]);
    }

    #[test]
    fn test_shape_checks() {
        assert_eq!(
            Tensor::new([1, 3, 2, 2], vec![0.0; 5]),
            Err(InferenceError::DataLength {
                expected: 12,
                found: 5
            })
        );
        let t = Tensor::new([1, 3, 2, 2], vec![0.0; 12]).unwrap();
        assert!(matches!(
            nchw_to_rgba(&t, 4, 4),
            Err(InferenceError::ShapeMismatch { .. })
        ));
    }
}

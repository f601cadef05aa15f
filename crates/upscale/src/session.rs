//! Inference session seam.
//!
//! The model runtime is an external collaborator: a [`ModelLoader`]
//! resolves an opaque locator into an [`InferenceSession`], which maps an
//! input tensor to an output tensor.

use image::imageops::{self, FilterType};
use image::{Rgb, Rgb32FImage};

use crate::error::{InferenceError, ModelError};
use crate::tensor::Tensor;

/// How a session produces its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A learned super-resolution network.
    Neural,
    /// Plain resampling. Adds no detail beyond what sharpening recovers.
    Interpolating,
}

/// A loaded model, ready to run.
#[async_trait::async_trait]
pub trait InferenceSession: Send + Sync {
    /// Human-readable model name for logs.
    fn name(&self) -> &str;

    fn kind(&self) -> SessionKind {
        SessionKind::Neural
    }

    /// Run the model on a `[1, 3, H, W]` tensor.
    async fn run(&self, input: Tensor) -> Result<Tensor, InferenceError>;
}

/// Resolves a model locator into a session.
#[async_trait::async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, locator: &str) -> Result<Box<dyn InferenceSession>, ModelError>;
}

/// Interpolating 2x session for hosts without a neural runtime.
///
/// Resamples each plane with the configured filter. Output values are not
/// clamped; unmarshaling does that.
pub struct InterpolatingSession {
    name: String,
    filter: FilterType,
    scale: u32,
}

impl InterpolatingSession {
    pub fn new(name: impl Into<String>, filter: FilterType, scale: u32) -> Self {
        Self {
            name: name.into(),
            filter,
            scale,
        }
    }
}

#[async_trait::async_trait]
impl InferenceSession for InterpolatingSession {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Interpolating
    }

    async fn run(&self, input: Tensor) -> Result<Tensor, InferenceError> {
        let [n, c, h, w] = input.shape();
        if n != 1 || c != 3 {
            return Err(InferenceError::Backend(format!(
                "expected [1, 3, H, W] input, got {:?}",
                input.shape()
            )));
        }
        if h == 0 || w == 0 {
            return Err(InferenceError::EmptyInput);
        }

        let plane = h * w;
        let data = input.data();
        let source = Rgb32FImage::from_fn(w as u32, h as u32, |x, y| {
            let i = y as usize * w + x as usize;
            Rgb([data[i], data[plane + i], data[2 * plane + i]])
        });

        let (out_w, out_h) = (w as u32 * self.scale, h as u32 * self.scale);
        let resized = imageops::resize(&source, out_w, out_h, self.filter);

        let out_plane = (out_w * out_h) as usize;
        let mut out = vec![0.0f32; 3 * out_plane];
        for (i, px) in resized.pixels().enumerate() {
            out[i] = px.0[0];
            out[out_plane + i] = px.0[1];
            out[2 * out_plane + i] = px.0[2];
        }
        Tensor::new([1, 3, out_h as usize, out_w as usize], out)
    }
}

/// Whether `locator` names a built-in interpolating session.
pub fn is_builtin_locator(locator: &str) -> bool {
    locator.starts_with(BUILTIN_PREFIX)
}

const BUILTIN_PREFIX: &str = "builtin:";

/// Loader for `builtin:` locators.
///
/// `builtin:catmull-rom`, `builtin:lanczos3` and `builtin:bilinear` map to
/// [`InterpolatingSession`]s. No neural runtime ships with this crate; any
/// other locator (an `.onnx` path, say) yields [`ModelError::Unavailable`]
/// unless the host supplies its own [`ModelLoader`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinLoader;

#[async_trait::async_trait]
impl ModelLoader for BuiltinLoader {
    async fn load(&self, locator: &str) -> Result<Box<dyn InferenceSession>, ModelError> {
        let filter = match locator.strip_prefix(BUILTIN_PREFIX) {
            Some("catmull-rom") => FilterType::CatmullRom,
            Some("lanczos3") => FilterType::Lanczos3,
            Some("bilinear") => FilterType::Triangle,
            Some(other) => {
                return Err(ModelError::LoadFailed {
                    locator: locator.to_string(),
                    reason: format!("unknown builtin filter '{other}'"),
                })
            }
            None => {
                return Err(ModelError::Unavailable {
                    locator: locator.to_string(),
                })
            }
        };
        Ok(Box::new(InterpolatingSession::new(
            locator,
            filter,
            crate::model::SCALE,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_doubles_planes() {
        let session = BuiltinLoader.load("builtin:bilinear").await.unwrap();
        let input = Tensor::new([1, 3, 2, 3], vec![0.5; 18]).unwrap();
        assert_eq!(session.kind(), SessionKind::Interpolating);
        let out = session.run(input).await.unwrap();
        assert_eq!(out.shape(), [1, 3, 4, 6]);
        for v in out.data() {
            assert!((v - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_builtin_locator_detection() {
        assert!(is_builtin_locator(crate::model::DEFAULT_MODEL));
        assert!(!is_builtin_locator("models/realesrgan_x2.onnx"));
    }

    #[tokio::test]
    async fn test_unknown_locators() {
        assert!(matches!(
            BuiltinLoader.load("models/realesrgan_x2.onnx").await,
            Err(ModelError::Unavailable { .. })
        ));
        assert!(matches!(
            BuiltinLoader.load("builtin:magic").await,
            Err(ModelError::LoadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_input_shape() {
        let session = InterpolatingSession::new("t", FilterType::Nearest, 2);
        let input = Tensor::new([1, 4, 1, 1], vec![0.0; 4]).unwrap();
        assert!(matches!(
            session.run(input).await,
            Err(InferenceError::Backend(_))
        ));
    }
}

//! The super-resolution model lifecycle.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::error::{InferenceError, ModelError, UpscaleError};
use crate::session::{InferenceSession, ModelLoader, SessionKind};
use crate::sharpen::sharpen;
use crate::tensor::{nchw_to_rgba, rgba_to_nchw};

/// Linear upscale factor of the model.
pub const SCALE: u32 = 2;

/// Post-inference sharpen strength.
pub const SHARPEN_STRENGTH: f32 = 2.5;

/// Locator used when none is configured.
pub const DEFAULT_MODEL: &str = "builtin:catmull-rom";

/// A 2x upscaler backed by a lazily loaded inference session.
pub struct SuperResolutionModel {
    locator: String,
    loader: Arc<dyn ModelLoader>,
    session: Option<Box<dyn InferenceSession>>,
}

impl SuperResolutionModel {
    pub fn new(locator: impl Into<String>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            locator: locator.into(),
            loader,
            session: None,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Kind of the loaded session, if any.
    pub fn session_kind(&self) -> Option<SessionKind> {
        self.session.as_ref().map(|s| s.kind())
    }

    /// Acquire the inference session. A no-op when already loaded.
    pub async fn load_model(&mut self) -> Result<(), ModelError> {
        if self.session.is_some() {
            return Ok(());
        }
        tracing::info!(locator = %self.locator, "Loading super-resolution model");
        match self.loader.load(&self.locator).await {
            Ok(session) => {
                if session.kind() == SessionKind::Interpolating {
                    tracing::warn!(
                        model = session.name(),
                        "No neural runtime loaded; upscaling interpolates and sharpens"
                    );
                }
                tracing::info!(model = session.name(), "Super-resolution model ready");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                tracing::error!(locator = %self.locator, error = %e, "Model load failed");
                Err(e)
            }
        }
    }

    /// Release the session. `load_model` may be called again afterwards.
    pub fn dispose(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(locator = %self.locator, "Super-resolution model disposed");
        }
    }

    /// Upscale one frame to `2W x 2H`.
    ///
    /// Alpha in the result is always 255. The sharpen pass leaves the
    /// outermost pixel ring as the model produced it.
    pub async fn upscale(&self, image: &RgbaImage) -> Result<RgbaImage, UpscaleError> {
        let session = self.session.as_ref().ok_or(ModelError::NotLoaded)?;
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(InferenceError::EmptyInput.into());
        }

        let output = session.run(rgba_to_nchw(image)).await?;
        let upscaled = nchw_to_rgba(&output, w * SCALE, h * SCALE)?;
        Ok(sharpen(&upscaled, SHARPEN_STRENGTH))
    }

    /// Plain 2x resize used when inference fails for a frame.
    pub fn resize_fallback(image: &RgbaImage) -> RgbaImage {
        let (w, h) = image.dimensions();
        imageops::resize(image, w * SCALE, h * SCALE, FilterType::Triangle)
    }
}

impl std::fmt::Debug for SuperResolutionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuperResolutionModel")
            .field("locator", &self.locator)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::Rgba;

    use super::*;
    use crate::tensor::Tensor;

    /// Nearest-neighbour 2x session.
    struct NearestSession;

    #[async_trait::async_trait]
    impl InferenceSession for NearestSession {
        fn name(&self) -> &str {
            "nearest"
        }

        async fn run(&self, input: Tensor) -> Result<Tensor, InferenceError> {
            let [_, _, h, w] = input.shape();
            let src = input.data();
            let (oh, ow) = (h * 2, w * 2);
            let mut out = Vec::with_capacity(3 * oh * ow);
            for c in 0..3 {
                for y in 0..oh {
                    for x in 0..ow {
                        out.push(src[c * h * w + (y / 2) * w + x / 2]);
                    }
                }
            }
            Tensor::new([1, 3, oh, ow], out)
        }
    }

    /// Returns a tensor of the input size, which the model must reject.
    struct WrongShapeSession;

    #[async_trait::async_trait]
    impl InferenceSession for WrongShapeSession {
        fn name(&self) -> &str {
            "wrong-shape"
        }

        async fn run(&self, input: Tensor) -> Result<Tensor, InferenceError> {
            Ok(input)
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        wrong_shape: bool,
    }

    #[async_trait::async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self, _locator: &str) -> Result<Box<dyn InferenceSession>, ModelError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.wrong_shape {
                Ok(Box::new(WrongShapeSession))
            } else {
                Ok(Box::new(NearestSession))
            }
        }
    }

    fn loader(wrong_shape: bool) -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            wrong_shape,
        })
    }

    #[tokio::test]
    async fn test_upscale_before_load_fails() {
        let model = SuperResolutionModel::new("mock", loader(false));
        let img = RgbaImage::new(4, 4);
        assert_eq!(
            model.upscale(&img).await,
            Err(UpscaleError::Model(ModelError::NotLoaded))
        );
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let counting = loader(false);
        let mut model = SuperResolutionModel::new("mock", counting.clone());
        assert_eq!(model.session_kind(), None);
        model.load_model().await.unwrap();
        model.load_model().await.unwrap();
        assert!(model.is_loaded());
        assert_eq!(model.session_kind(), Some(SessionKind::Neural));
        assert_eq!(counting.loads.load(Ordering::SeqCst), 1);

        model.dispose();
        assert!(!model.is_loaded());
        model.load_model().await.unwrap();
        assert_eq!(counting.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upscale_doubles_and_forces_alpha() {
        let mut model = SuperResolutionModel::new("mock", loader(false));
        model.load_model().await.unwrap();
        let img = RgbaImage::from_pixel(3, 2, Rgba([40, 80, 120, 9]));
        let out = model.upscale(&img).await.unwrap();
        assert_eq!(out.dimensions(), (6, 4));
        // flat input stays flat through the sharpen
        for px in out.pixels() {
            assert_eq!(px.0, [40, 80, 120, 255]);
        }
    }

    #[tokio::test]
    async fn test_wrong_output_shape_is_inference_error() {
        let mut model = SuperResolutionModel::new("mock", loader(true));
        model.load_model().await.unwrap();
        let img = RgbaImage::new(2, 2);
        assert!(matches!(
            model.upscale(&img).await,
            Err(UpscaleError::Inference(InferenceError::ShapeMismatch { .. }))
        ));
    }

    #[test]
    fn test_resize_fallback_doubles() {
        let img = RgbaImage::from_pixel(5, 3, Rgba([1, 2, 3, 4]));
        let out = SuperResolutionModel::resize_fallback(&img);
        assert_eq!(out.dimensions(), (10, 6));
        assert_eq!(out.get_pixel(4, 2).0, [1, 2, 3, 4]);
    }
}

//! End-to-end upscale through the built-in interpolating session.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use lumagrade_upscale::{BuiltinLoader, SessionKind, SuperResolutionModel, DEFAULT_MODEL, SCALE};

#[tokio::test]
async fn builtin_model_upscales_gradient() {
    let mut model = SuperResolutionModel::new(DEFAULT_MODEL, Arc::new(BuiltinLoader));
    model.load_model().await.unwrap();
    assert_eq!(model.session_kind(), Some(SessionKind::Interpolating));

    let img = RgbaImage::from_fn(16, 9, |x, y| Rgba([(x * 15) as u8, (y * 28) as u8, 128, 200]));
    let out = model.upscale(&img).await.unwrap();

    assert_eq!(out.dimensions(), (16 * SCALE, 9 * SCALE));
    assert!(out.pixels().all(|p| p.0[3] == 255));
    // blue is flat in the source and stays flat after interpolation and sharpening
    assert!(out.pixels().all(|p| p.0[2] == 128));

    model.dispose();
    assert!(!model.is_loaded());
}

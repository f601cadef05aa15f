//! Lumagrade Upscale: 2x neural super-resolution for export frames
//!
//! Wraps an inference session behind [`SuperResolutionModel`]:
//! - RGBA8 frames are marshaled to planar float NCHW tensors ([`tensor`])
//! - the session runs the model ([`session`])
//! - the output is unmarshaled and passed through a 3x3 sharpen ([`sharpen`])
//!
//! Inference runtimes plug in through [`ModelLoader`]. No neural runtime is
//! bundled; the built-in sessions interpolate, and report
//! [`SessionKind::Interpolating`] so callers can say so.

pub mod error;
pub mod model;
pub mod session;
pub mod sharpen;
pub mod tensor;

pub use error::{InferenceError, ModelError, UpscaleError};
pub use model::{SuperResolutionModel, DEFAULT_MODEL, SCALE, SHARPEN_STRENGTH};
pub use session::{
    is_builtin_locator, BuiltinLoader, InferenceSession, InterpolatingSession, ModelLoader,
    SessionKind,
};
pub use tensor::Tensor;

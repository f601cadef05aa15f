//! Model and inference errors.

use lumagrade_common::error::LumaError;

/// The inference session is missing or could not be created.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("super-resolution model is not loaded")]
    NotLoaded,

    #[error("no inference runtime can load '{locator}'")]
    Unavailable { locator: String },

    #[error("failed to load model '{locator}': {reason}")]
    LoadFailed { locator: String, reason: String },
}

/// A single inference call failed. Recoverable per frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("cannot upscale an empty frame")]
    EmptyInput,

    #[error("tensor data has {found} values, shape needs {expected}")]
    DataLength { expected: usize, found: usize },

    #[error("unexpected output shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        found: [usize; 4],
    },

    #[error("inference backend failed: {0}")]
    Backend(String),
}

/// Either failure of [`crate::SuperResolutionModel::upscale`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpscaleError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl From<ModelError> for LumaError {
    fn from(err: ModelError) -> Self {
        LumaError::model(err.to_string())
    }
}

impl From<InferenceError> for LumaError {
    fn from(err: InferenceError) -> Self {
        LumaError::inference(err.to_string())
    }
}

impl From<UpscaleError> for LumaError {
    fn from(err: UpscaleError) -> Self {
        match err {
            UpscaleError::Model(e) => e.into(),
            UpscaleError::Inference(e) => e.into(),
        }
    }
}

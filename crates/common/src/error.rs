//! Error types shared across Lumagrade crates.

use std::path::PathBuf;

/// Top-level error type for Lumagrade operations.
///
/// Component crates keep their own typed errors (LUT parsing, model
/// loading, inference) and convert into this one at their boundary.
#[derive(Debug, thiserror::Error)]
pub enum LumaError {
    /// A requested capability is unavailable or the request is invalid.
    /// Raised before a job reaches the encoding stage.
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("LUT parse error: {message}")]
    LutParse { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Inference error: {message}")]
    Inference { message: String },

    #[error("Encode error: {message}")]
    Encode { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using LumaError.
pub type LumaResult<T> = Result<T, LumaError>;

impl LumaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn lut_parse(msg: impl Into<String>) -> Self {
        Self::LutParse {
            message: msg.into(),
        }
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model {
            message: msg.into(),
        }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference {
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode {
            message: msg.into(),
        }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_is_transparent() {
        let err: LumaError = std::io::Error::other("disk full").into();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_messages() {
        let err = LumaError::encode("flush failed");
        assert_eq!(err.to_string(), "Encode error: flush failed");
    }
}

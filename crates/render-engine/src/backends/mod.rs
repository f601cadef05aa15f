//! Encoder and muxer backends.

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use lumagrade_common::error::LumaError;
use serde::{Deserialize, Serialize};

use crate::encode::{ContainerMuxer, EncodePipeline, VideoEncoder};

pub mod ffmpeg;
pub mod y4m;

pub use ffmpeg::{ByteStreamMuxer, FfmpegH264Encoder};
pub use y4m::{RawI420Encoder, Y4mMuxer};

/// Which encoder/muxer pair an export uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderKind {
    /// libx264 through ffmpeg, fragmented MP4.
    #[default]
    H264,
    /// Uncompressed 4:2:0 in a YUV4MPEG2 stream.
    Y4m,
}

impl EncoderKind {
    pub fn create(self) -> (Box<dyn VideoEncoder>, Box<dyn ContainerMuxer>) {
        match self {
            EncoderKind::H264 => (
                Box::new(FfmpegH264Encoder::new()),
                Box::new(ByteStreamMuxer::new("mp4")),
            ),
            EncoderKind::Y4m => (Box::new(RawI420Encoder::new()), Box::new(Y4mMuxer::new())),
        }
    }

    /// A fresh pipeline over this backend pair.
    pub fn pipeline(self) -> EncodePipeline {
        let (encoder, muxer) = self.create();
        EncodePipeline::new(encoder, muxer)
    }
}

impl FromStr for EncoderKind {
    type Err = LumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "mp4" => Ok(Self::H264),
            "y4m" | "raw" => Ok(Self::Y4m),
            other => Err(LumaError::validation(format!(
                "unknown codec '{other}' (expected h264 or y4m)"
            ))),
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncoderKind::H264 => f.write_str("h264"),
            EncoderKind::Y4m => f.write_str("y4m"),
        }
    }
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("H264".parse::<EncoderKind>().unwrap(), EncoderKind::H264);
        assert_eq!("y4m".parse::<EncoderKind>().unwrap(), EncoderKind::Y4m);
        assert!("vp9".parse::<EncoderKind>().is_err());
        assert_eq!(EncoderKind::default().to_string(), "h264");
    }

    #[test]
    fn test_create_pairs() {
        let (encoder, muxer) = EncoderKind::Y4m.create();
        assert_eq!(encoder.name(), "raw-i420");
        assert_eq!(muxer.extension(), "y4m");
        let (encoder, muxer) = EncoderKind::H264.create();
        assert_eq!(encoder.name(), "ffmpeg-libx264");
        assert_eq!(muxer.extension(), "mp4");
    }
}

//! Export requests and resolved jobs.
//!
//! An [`ExportRequest`] is what the caller asks for. [`ExportJob::resolve`]
//! checks it against the source media and produces the immutable job the
//! controller runs. Later edits to the caller's settings never reach a
//! job that has already been resolved.

use std::fmt;
use std::str::FromStr;

use lumagrade_color::{ColorSettings, LutStack};
use lumagrade_common::clock;
use lumagrade_common::error::{LumaError, LumaResult};
use serde::{Deserialize, Serialize};

use crate::backends::EncoderKind;
use crate::decode::MediaInfo;

/// Output frame rates accepted for export.
pub const SUPPORTED_FPS: [u32; 4] = [24, 25, 30, 60];

/// Longest source accepted for export.
pub const MAX_SOURCE_DURATION_SECS: f64 = 180.0;

/// Audio bitrate assumed by size estimates.
pub const DEFAULT_AUDIO_BITRATE: u64 = 128_000;

/// Upscale factor applied to target dimensions when upscaling.
pub const UPSCALE_FACTOR: u32 = lumagrade_upscale::SCALE;

/// Bitrate presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    Low,
    Medium,
    #[default]
    High,
    Custom,
}

impl ExportQuality {
    /// Video bitrate in bits per second.
    ///
    /// `Custom` is the default used when no explicit bitrate is given.
    pub fn bitrate(self) -> u64 {
        match self {
            ExportQuality::Low => 5_000_000,
            ExportQuality::Medium => 10_000_000,
            ExportQuality::High => 20_000_000,
            ExportQuality::Custom => 15_000_000,
        }
    }
}

impl FromStr for ExportQuality {
    type Err = LumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "custom" => Ok(Self::Custom),
            other => Err(LumaError::validation(format!(
                "unknown quality '{other}' (expected low, medium, high or custom)"
            ))),
        }
    }
}

impl fmt::Display for ExportQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportQuality::Low => "low",
            ExportQuality::Medium => "medium",
            ExportQuality::High => "high",
            ExportQuality::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// How frames are pulled from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStrategy {
    /// Accelerated playback, capturing presented frames.
    Realtime,
    /// Seek to every output frame time.
    Deterministic,
}

impl FromStr for FrameStrategy {
    type Err = LumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realtime" => Ok(Self::Realtime),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(LumaError::validation(format!(
                "unknown strategy '{other}' (expected realtime or deterministic)"
            ))),
        }
    }
}

impl fmt::Display for FrameStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameStrategy::Realtime => f.write_str("realtime"),
            FrameStrategy::Deterministic => f.write_str("deterministic"),
        }
    }
}

/// What the caller asks to export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub quality: ExportQuality,

    /// Overrides the preset bitrate when `quality` is `Custom`.
    pub explicit_bitrate: Option<u64>,

    pub fps: u32,

    pub upscale_enabled: bool,

    /// `None` picks Deterministic when upscaling, Realtime otherwise.
    pub strategy: Option<FrameStrategy>,

    pub codec: EncoderKind,

    pub color_settings: ColorSettings,

    pub lut_stack: LutStack,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            quality: ExportQuality::default(),
            explicit_bitrate: None,
            fps: 30,
            upscale_enabled: false,
            strategy: None,
            codec: EncoderKind::default(),
            color_settings: ColorSettings::default(),
            lut_stack: LutStack::default(),
        }
    }
}

/// A validated, immutable export job.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub target_width: u32,
    pub target_height: u32,
    pub fps: u32,
    /// Bits per second, before any codec-level adjustment.
    pub bitrate: u64,
    pub strategy: FrameStrategy,
    pub codec: EncoderKind,
    pub color_settings: ColorSettings,
    pub lut_stack: LutStack,
    pub upscale_enabled: bool,
    pub duration_secs: f64,
}

impl ExportJob {
    /// Validate `request` against the source and fix the job parameters.
    pub fn resolve(request: &ExportRequest, source: &MediaInfo) -> LumaResult<Self> {
        if !SUPPORTED_FPS.contains(&request.fps) {
            return Err(LumaError::validation(format!(
                "unsupported frame rate {} (expected one of {:?})",
                request.fps, SUPPORTED_FPS
            )));
        }

        if !source.duration_secs.is_finite() || source.duration_secs <= 0.0 {
            return Err(LumaError::validation("source has no playable duration"));
        }
        if source.duration_secs > MAX_SOURCE_DURATION_SECS {
            return Err(LumaError::validation(format!(
                "source is {:.1}s long; the limit is {:.0}s",
                source.duration_secs, MAX_SOURCE_DURATION_SECS
            )));
        }

        let (even_w, even_h) = (source.width & !1, source.height & !1);
        if even_w == 0 || even_h == 0 {
            return Err(LumaError::validation(format!(
                "source dimensions {}x{} are too small to encode",
                source.width, source.height
            )));
        }
        let scale = if request.upscale_enabled {
            UPSCALE_FACTOR
        } else {
            1
        };

        let bitrate = match (request.quality, request.explicit_bitrate) {
            (ExportQuality::Custom, Some(bps)) if bps > 0 => bps,
            (ExportQuality::Custom, Some(_)) => {
                return Err(LumaError::validation("custom bitrate must be positive"))
            }
            (quality, _) => quality.bitrate(),
        };

        let strategy = request.strategy.unwrap_or(if request.upscale_enabled {
            FrameStrategy::Deterministic
        } else {
            FrameStrategy::Realtime
        });

        Ok(Self {
            target_width: even_w * scale,
            target_height: even_h * scale,
            fps: request.fps,
            bitrate,
            strategy,
            codec: request.codec,
            color_settings: request.color_settings.clamped(),
            lut_stack: request.lut_stack.clone(),
            upscale_enabled: request.upscale_enabled,
            duration_secs: source.duration_secs,
        })
    }

    /// Expected number of output frames.
    pub fn total_frames(&self) -> u64 {
        clock::total_frames(self.duration_secs, self.fps)
    }

    pub fn estimated_file_size_bytes(&self) -> u64 {
        estimate_file_size_bytes(self.duration_secs, self.bitrate, DEFAULT_AUDIO_BITRATE)
    }
}

/// `duration * (video + audio bitrate) / 8`, rounded.
pub fn estimate_file_size_bytes(duration_secs: f64, video_bitrate: u64, audio_bitrate: u64) -> u64 {
    if duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * video_bitrate.saturating_add(audio_bitrate) as f64 / 8.0).round() as u64
}

/// Rough export wall time: one and a half times the source duration.
pub fn estimate_export_time_secs(duration_secs: f64) -> u64 {
    (duration_secs.max(0.0) * 1.5).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(w: u32, h: u32, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            width: w,
            height: h,
            duration_secs,
            frame_rate: 30.0,
        }
    }

    #[test]
    fn test_quality_presets() {
        assert_eq!(ExportQuality::Low.bitrate(), 5_000_000);
        assert_eq!(ExportQuality::Medium.bitrate(), 10_000_000);
        assert_eq!(ExportQuality::High.bitrate(), 20_000_000);
        assert_eq!(ExportQuality::Custom.bitrate(), 15_000_000);
        assert_eq!("MEDIUM".parse::<ExportQuality>().unwrap(), ExportQuality::Medium);
        assert!("ultra".parse::<ExportQuality>().is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let job = ExportJob::resolve(&ExportRequest::default(), &source(1920, 1080, 2.0)).unwrap();
        assert_eq!((job.target_width, job.target_height), (1920, 1080));
        assert_eq!(job.bitrate, 20_000_000);
        assert_eq!(job.strategy, FrameStrategy::Realtime);
        assert_eq!(job.total_frames(), 60);
    }

    #[test]
    fn test_resolve_upscale_doubles_even_dims() {
        let request = ExportRequest {
            upscale_enabled: true,
            ..Default::default()
        };
        let job = ExportJob::resolve(&request, &source(641, 361, 1.0)).unwrap();
        assert_eq!((job.target_width, job.target_height), (1280, 720));
        assert_eq!(job.strategy, FrameStrategy::Deterministic);
    }

    #[test]
    fn test_explicit_strategy_wins() {
        let request = ExportRequest {
            upscale_enabled: true,
            strategy: Some(FrameStrategy::Realtime),
            ..Default::default()
        };
        let job = ExportJob::resolve(&request, &source(640, 360, 1.0)).unwrap();
        assert_eq!(job.strategy, FrameStrategy::Realtime);
    }

    #[test]
    fn test_custom_bitrate() {
        let request = ExportRequest {
            quality: ExportQuality::Custom,
            explicit_bitrate: Some(8_000_000),
            ..Default::default()
        };
        let job = ExportJob::resolve(&request, &source(640, 360, 1.0)).unwrap();
        assert_eq!(job.bitrate, 8_000_000);

        let request = ExportRequest {
            quality: ExportQuality::Custom,
            ..Default::default()
        };
        let job = ExportJob::resolve(&request, &source(640, 360, 1.0)).unwrap();
        assert_eq!(job.bitrate, 15_000_000);
    }

    #[test]
    fn test_validation_failures() {
        let bad_fps = ExportRequest {
            fps: 29,
            ..Default::default()
        };
        assert!(matches!(
            ExportJob::resolve(&bad_fps, &source(640, 360, 1.0)),
            Err(LumaError::Validation { .. })
        ));
        let ok = ExportRequest::default();
        assert!(matches!(
            ExportJob::resolve(&ok, &source(640, 360, 181.0)),
            Err(LumaError::Validation { .. })
        ));
        assert!(matches!(
            ExportJob::resolve(&ok, &source(1, 360, 1.0)),
            Err(LumaError::Validation { .. })
        ));
        assert!(matches!(
            ExportJob::resolve(&ok, &source(640, 360, 0.0)),
            Err(LumaError::Validation { .. })
        ));
    }

    #[test]
    fn test_settings_snapshot_is_clamped() {
        let request = ExportRequest {
            color_settings: ColorSettings {
                contrast: 400.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let job = ExportJob::resolve(&request, &source(640, 360, 1.0)).unwrap();
        assert_eq!(job.color_settings.contrast, 100.0);
    }

    #[test]
    fn test_size_estimates() {
        // 10 s at 20 Mbps + 128 kbps audio
        assert_eq!(
            estimate_file_size_bytes(10.0, 20_000_000, DEFAULT_AUDIO_BITRATE),
            25_160_000
        );
        assert_eq!(estimate_file_size_bytes(0.0, 20_000_000, 0), 0);
        assert_eq!(
            estimate_file_size_bytes(8.0, u64::MAX, DEFAULT_AUDIO_BITRATE),
            u64::MAX
        );
        assert_eq!(estimate_export_time_secs(10.0), 15);
    }
}

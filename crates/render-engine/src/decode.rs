//! Media decode service.
//!
//! The export pipeline never demuxes or decodes itself. It talks to a
//! [`MediaDecoder`], which hands back RGBA pixel buffers for a seek
//! position or for the frame currently presented during playback.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use image::RgbaImage;
use lumagrade_common::error::{LumaError, LumaResult};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// Properties of the source media.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    /// Native frame rate of the source.
    pub frame_rate: f64,
}

/// A frame-presentation event during playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Presentation {
    /// Media time of the presented frame.
    pub media_time_secs: f64,
    /// Wall time since playback started.
    pub wall_time: Duration,
}

/// A source of decoded pixels.
///
/// One handle is driven by exactly one frame source at a time; the
/// borrow rules on `&mut self` enforce that during an export.
#[async_trait::async_trait]
pub trait MediaDecoder: Send {
    async fn info(&mut self) -> LumaResult<MediaInfo>;

    /// Move to `secs`. Resolves once the seek has completed.
    async fn seek(&mut self, secs: f64) -> LumaResult<()>;

    /// Pixels of the current position (or the frame last presented).
    async fn capture(&mut self) -> LumaResult<RgbaImage>;

    /// Start playback from the current position at `rate` times realtime.
    async fn play(&mut self, rate: f64) -> LumaResult<()>;

    /// Wait for the next presented frame. `None` at end of stream.
    async fn next_presentation(&mut self) -> LumaResult<Option<Presentation>>;

    async fn pause(&mut self) -> LumaResult<()>;
}

#[derive(Debug, Deserialize)]
struct MediaListing {
    #[serde(default)]
    streams: Vec<ListedStream>,
    format: Option<ListedFormat>,
}

#[derive(Debug, Deserialize)]
struct ListedStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListedFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rational such as `30000/1001`.
fn parse_rational(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((n, d)) => {
            let n = n.trim().parse::<f64>().ok()?;
            let d = d.trim().parse::<f64>().ok()?;
            (d != 0.0).then_some(n / d)
        }
        None => raw.trim().parse::<f64>().ok(),
    }
}

fn parse_media_info(json: &str) -> LumaResult<MediaInfo> {
    let parsed: MediaListing = serde_json::from_str(json)?;
    let stream = parsed
        .streams
        .first()
        .ok_or_else(|| LumaError::decode("source has no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(LumaError::decode("video stream has no dimensions")),
    };

    // The container duration also covers audio and edit-list padding, so
    // the video stream's own duration wins when both are present.
    let parse_secs = |raw: Option<&str>| {
        raw.and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
    };
    let duration_secs = parse_secs(stream.duration.as_deref())
        .or_else(|| parse_secs(parsed.format.as_ref().and_then(|f| f.duration.as_deref())))
        .ok_or_else(|| LumaError::decode("source has no duration"))?;

    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .filter(|fps| *fps > 0.0)
        .unwrap_or(30.0);

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
        frame_rate,
    })
}

/// Media time of the last decodable frame.
fn last_frame_secs(info: &MediaInfo) -> f64 {
    (info.duration_secs - 1.0 / info.frame_rate).max(0.0)
}

/// Running accelerated playback.
struct Playback {
    child: Child,
    started: Instant,
    presented: u64,
}

/// Decoder backed by `ffmpeg`/`ffprobe` subprocesses.
///
/// Seeks extract one frame per call. Playback streams raw RGBA from a
/// single process paced with `-readrate`.
pub struct FfmpegDecoder {
    path: PathBuf,
    info: Option<MediaInfo>,
    position_secs: f64,
    playback: Option<Playback>,
    last_presented: Option<RgbaImage>,
    last_extracted: Option<RgbaImage>,
}

impl FfmpegDecoder {
    pub fn open(path: impl AsRef<Path>) -> LumaResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(LumaError::FileNotFound { path });
        }
        Ok(Self {
            path,
            info: None,
            position_secs: 0.0,
            playback: None,
            last_presented: None,
            last_extracted: None,
        })
    }

    /// Whether `ffmpeg` and `ffprobe` are on `PATH`.
    pub fn is_available() -> bool {
        crate::backends::command_exists("ffmpeg") && crate::backends::command_exists("ffprobe")
    }

    async fn read_media_info(&self) -> LumaResult<MediaInfo> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,r_frame_rate,duration:format=duration",
                "-of",
                "json",
            ])
            .arg(&self.path)
            .output()
            .await
            .map_err(|e| LumaError::decode(format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(LumaError::decode(format!(
                "ffprobe failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_media_info(&String::from_utf8_lossy(&output.stdout))
    }

    async fn cached_info(&mut self) -> LumaResult<MediaInfo> {
        if let Some(info) = self.info {
            return Ok(info);
        }
        let info = self.read_media_info().await?;
        tracing::debug!(
            path = %self.path.display(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration_secs,
            frame_rate = info.frame_rate,
            "Read source media info"
        );
        self.info = Some(info);
        Ok(info)
    }

    fn frame_bytes(info: &MediaInfo) -> usize {
        info.width as usize * info.height as usize * 4
    }

    fn to_image(info: &MediaInfo, buffer: Vec<u8>) -> LumaResult<RgbaImage> {
        RgbaImage::from_raw(info.width, info.height, buffer)
            .ok_or_else(|| LumaError::decode("decoded buffer does not match frame size"))
    }

    /// Decode the frame at `secs`. `None` when ffmpeg finds no frame there,
    /// which happens for seeks at or past the end of the video stream.
    async fn extract_frame(&mut self, secs: f64) -> LumaResult<Option<RgbaImage>> {
        let info = self.cached_info().await?;
        let output = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-ss"])
            .arg(format!("{secs:.6}"))
            .arg("-i")
            .arg(&self.path)
            .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LumaError::decode(format!("Failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(LumaError::decode(format!(
                "ffmpeg frame extraction at {secs:.3}s failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let expected = Self::frame_bytes(&info);
        if output.stdout.is_empty() {
            return Ok(None);
        }
        if output.stdout.len() < expected {
            return Err(LumaError::decode(format!(
                "truncated frame at {secs:.3}s (got {} of {expected} bytes)",
                output.stdout.len()
            )));
        }
        let mut buffer = output.stdout;
        buffer.truncate(expected);
        Self::to_image(&info, buffer).map(Some)
    }

    /// Keep an extracted frame, or repeat the previous one past the end.
    fn settle_extracted(
        &mut self,
        extracted: Option<RgbaImage>,
        secs: f64,
    ) -> LumaResult<RgbaImage> {
        match extracted {
            Some(image) => {
                self.last_extracted = Some(image.clone());
                Ok(image)
            }
            None => {
                let previous = self
                    .last_extracted
                    .clone()
                    .ok_or_else(|| LumaError::decode(format!("no frame at {secs:.3}s")))?;
                tracing::debug!(secs, "No frame at seek position, repeating previous frame");
                Ok(previous)
            }
        }
    }

    async fn stop_playback(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            let _ = playback.child.kill().await;
            let _ = playback.child.wait().await;
            tracing::debug!(presented = playback.presented, "Playback stopped");
        }
    }
}

#[async_trait::async_trait]
impl MediaDecoder for FfmpegDecoder {
    async fn info(&mut self) -> LumaResult<MediaInfo> {
        self.cached_info().await
    }

    async fn seek(&mut self, secs: f64) -> LumaResult<()> {
        self.stop_playback().await;
        let limit = self.info.as_ref().map_or(f64::MAX, last_frame_secs);
        self.position_secs = secs.clamp(0.0, limit);
        self.last_presented = None;
        Ok(())
    }

    async fn capture(&mut self) -> LumaResult<RgbaImage> {
        if self.playback.is_some() {
            return self
                .last_presented
                .clone()
                .ok_or_else(|| LumaError::decode("no frame has been presented yet"));
        }
        let secs = self.position_secs;
        let extracted = self.extract_frame(secs).await?;
        self.settle_extracted(extracted, secs)
    }

    async fn play(&mut self, rate: f64) -> LumaResult<()> {
        self.stop_playback().await;
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };

        let child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .arg("-readrate")
            .arg(format!("{rate:.3}"))
            .arg("-ss")
            .arg(format!("{:.6}", self.position_secs))
            .arg("-i")
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LumaError::decode(format!("Failed to start ffmpeg playback: {e}")))?;

        tracing::info!(pid = child.id(), rate, from_secs = self.position_secs, "Playback started");
        self.playback = Some(Playback {
            child,
            started: Instant::now(),
            presented: 0,
        });
        Ok(())
    }

    async fn next_presentation(&mut self) -> LumaResult<Option<Presentation>> {
        let info = self.cached_info().await?;
        let start = self.position_secs;
        let Some(playback) = self.playback.as_mut() else {
            return Err(LumaError::decode("playback has not been started"));
        };
        let stdout = playback
            .child
            .stdout
            .as_mut()
            .ok_or_else(|| LumaError::decode("Failed to capture ffmpeg stdout"))?;

        let mut buffer = vec![0u8; Self::frame_bytes(&info)];
        match stdout.read_exact(&mut buffer).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(LumaError::decode(format!("Failed reading playback: {e}"))),
        }

        let media_time_secs = start + playback.presented as f64 / info.frame_rate;
        let wall_time = playback.started.elapsed();
        playback.presented += 1;
        self.last_presented = Some(Self::to_image(&info, buffer)?);

        Ok(Some(Presentation {
            media_time_secs,
            wall_time,
        }))
    }

    async fn pause(&mut self) -> LumaResult<()> {
        self.stop_playback().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_info_json() {
        let json = r#"{
            "programs": [],
            "streams": [{"width": 1920, "height": 1080, "r_frame_rate": "30000/1001"}],
            "format": {"duration": "12.345000"}
        }"#;
        let info = parse_media_info(json).unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.duration_secs - 12.345).abs() < 1e-9);
        assert!((info.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_media_info_falls_back_to_stream_duration() {
        let json = r#"{"streams": [{"width": 640, "height": 360, "duration": "2.0"}]}"#;
        let info = parse_media_info(json).unwrap();
        assert_eq!(info.duration_secs, 2.0);
        assert_eq!(info.frame_rate, 30.0);
    }

    #[test]
    fn test_parse_media_info_prefers_video_stream_duration() {
        // audio runs 20 ms past the last video frame
        let json = r#"{
            "streams": [{"width": 1280, "height": 720, "r_frame_rate": "30/1", "duration": "2.000000"}],
            "format": {"duration": "2.020000"}
        }"#;
        let info = parse_media_info(json).unwrap();
        assert_eq!(info.duration_secs, 2.0);

        let json = r#"{
            "streams": [{"width": 1280, "height": 720, "duration": "N/A"}],
            "format": {"duration": "3.5"}
        }"#;
        assert_eq!(parse_media_info(json).unwrap().duration_secs, 3.5);
    }

    fn decoder_for(info: MediaInfo) -> FfmpegDecoder {
        FfmpegDecoder {
            path: PathBuf::from("clip.mp4"),
            info: Some(info),
            position_secs: 0.0,
            playback: None,
            last_presented: None,
            last_extracted: None,
        }
    }

    #[tokio::test]
    async fn test_seek_clamps_to_last_frame() {
        let mut decoder = decoder_for(MediaInfo {
            width: 2,
            height: 2,
            duration_secs: 2.02,
            frame_rate: 30.0,
        });
        decoder.seek(2.0).await.unwrap();
        assert!((decoder.position_secs - (2.02 - 1.0 / 30.0)).abs() < 1e-9);
        decoder.seek(-1.0).await.unwrap();
        assert_eq!(decoder.position_secs, 0.0);
        decoder.seek(1.0).await.unwrap();
        assert_eq!(decoder.position_secs, 1.0);
    }

    #[test]
    fn test_missing_frame_repeats_previous() {
        let mut decoder = decoder_for(MediaInfo {
            width: 2,
            height: 2,
            duration_secs: 2.0,
            frame_rate: 30.0,
        });
        assert!(matches!(
            decoder.settle_extracted(None, 0.0),
            Err(LumaError::Decode { .. })
        ));

        let frame = RgbaImage::from_pixel(2, 2, image::Rgba([9, 8, 7, 255]));
        assert_eq!(decoder.settle_extracted(Some(frame.clone()), 1.9).unwrap(), frame);
        assert_eq!(decoder.settle_extracted(None, 2.0).unwrap(), frame);
    }

    #[test]
    fn test_parse_media_info_rejects_missing_stream() {
        assert!(matches!(
            parse_media_info(r#"{"streams": []}"#),
            Err(LumaError::Decode { .. })
        ));
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("25/1"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("24"), Some(24.0));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(
            FfmpegDecoder::open("/definitely/not/here.mp4"),
            Err(LumaError::FileNotFound { .. })
        ));
    }
}

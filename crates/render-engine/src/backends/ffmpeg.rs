//! H.264 through an `ffmpeg` subprocess.
//!
//! Raw RGBA frames go to ffmpeg's stdin; fragmented MP4 comes back on
//! stdout. B-frames are disabled so output order equals input order, and
//! keyframes are forced on the same two-second schedule the pipeline uses.

use std::process::Stdio;

use lumagrade_common::error::{LumaError, LumaResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::encode::{
    ContainerMuxer, EncodedChunk, EncoderConfig, VideoEncoder, KEYFRAME_INTERVAL_SECS,
};
use crate::frame::Frame;

use super::command_exists;

const STDOUT_READ_SIZE: usize = 64 * 1024;

/// Encoder arguments for `config`, reading raw RGBA from stdin.
pub fn h264_args(config: &EncoderConfig) -> Vec<String> {
    let kbps = (config.bitrate / 1000).max(1000);
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", config.width, config.height),
        "-framerate".to_string(),
        config.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-profile:v".to_string(),
        "high".to_string(),
        "-level:v".to_string(),
        config.profile.level.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        format!("{kbps}k"),
        "-maxrate".to_string(),
        format!("{kbps}k"),
        "-bufsize".to_string(),
        format!("{}k", kbps * 2),
        "-bf".to_string(),
        "0".to_string(),
        "-g".to_string(),
        config.keyframe_interval().to_string(),
        "-force_key_frames".to_string(),
        format!("expr:gte(t,n_forced*{KEYFRAME_INTERVAL_SECS})"),
        "-movflags".to_string(),
        "frag_keyframe+empty_moov+default_base_moof".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        "-".to_string(),
    ]
}

struct RunningEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<Vec<u8>>,
    stdout_task: JoinHandle<()>,
    stderr_task: JoinHandle<String>,
}

/// libx264 via ffmpeg.
#[derive(Default)]
pub struct FfmpegH264Encoder {
    running: Option<RunningEncoder>,
    last_timestamp: i64,
    frame_duration: i64,
}

impl FfmpegH264Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes ffmpeg has written since the last call.
    fn drain_output(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        if let Some(running) = self.running.as_mut() {
            while let Ok(chunk) = running.output.try_recv() {
                bytes.extend_from_slice(&chunk);
            }
        }
        bytes
    }

    fn chunk(&self, data: Vec<u8>, keyframe: bool) -> Vec<EncodedChunk> {
        if data.is_empty() {
            return Vec::new();
        }
        vec![EncodedChunk {
            data,
            timestamp_micros: self.last_timestamp,
            duration_micros: self.frame_duration,
            keyframe,
        }]
    }
}

#[async_trait::async_trait]
impl VideoEncoder for FfmpegH264Encoder {
    fn name(&self) -> &str {
        "ffmpeg-libx264"
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    async fn configure(&mut self, config: &EncoderConfig) -> LumaResult<()> {
        self.reset();
        let args = h264_args(config);
        tracing::debug!(args = ?args, "Running ffmpeg encoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LumaError::encode(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            level = config.profile.level,
            "ffmpeg encoder started"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LumaError::encode("Failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| LumaError::encode("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| LumaError::encode("Failed to capture ffmpeg stderr"))?;

        // Both pipes are drained by their own tasks so stdin writes never
        // wait on a full stdout or stderr pipe.
        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_task = tokio::spawn(async move {
            let mut buf = vec![0u8; STDOUT_READ_SIZE];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        self.frame_duration = lumagrade_common::clock::frame_duration_micros(config.fps);
        self.last_timestamp = 0;
        self.running = Some(RunningEncoder {
            child,
            stdin: Some(stdin),
            output: rx,
            stdout_task,
            stderr_task,
        });
        Ok(())
    }

    async fn encode(&mut self, frame: &Frame, keyframe: bool) -> LumaResult<Vec<EncodedChunk>> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| LumaError::encode("encoder is not configured"))?;
        let stdin = running
            .stdin
            .as_mut()
            .ok_or_else(|| LumaError::encode("encoder input is closed"))?;
        stdin
            .write_all(frame.pixels.as_raw())
            .await
            .map_err(|e| LumaError::encode(format!("Failed writing frame to ffmpeg: {e}")))?;

        self.last_timestamp = frame.timestamp_micros;
        let data = self.drain_output();
        Ok(self.chunk(data, keyframe))
    }

    async fn flush(&mut self) -> LumaResult<Vec<EncodedChunk>> {
        let Some(mut running) = self.running.take() else {
            return Err(LumaError::encode("encoder is not configured"));
        };
        if let Some(mut stdin) = running.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| LumaError::encode(format!("Failed closing ffmpeg input: {e}")))?;
        }

        let status = running
            .child
            .wait()
            .await
            .map_err(|e| LumaError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let _ = (&mut running.stdout_task).await;
        let stderr_output = (&mut running.stderr_task)
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(LumaError::encode(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        let mut tail = Vec::new();
        while let Ok(chunk) = running.output.try_recv() {
            tail.extend_from_slice(&chunk);
        }
        tracing::debug!(tail_bytes = tail.len(), "ffmpeg encoder closed");
        Ok(self.chunk(tail, false))
    }

    fn reset(&mut self) {
        if let Some(mut running) = self.running.take() {
            drop(running.stdin.take());
            let _ = running.child.start_kill();
            running.stdout_task.abort();
            running.stderr_task.abort();
            tracing::debug!("ffmpeg encoder reset");
        }
    }
}

impl Drop for FfmpegH264Encoder {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Concatenates chunk bytes that already form a container stream.
#[derive(Debug)]
pub struct ByteStreamMuxer {
    extension: &'static str,
    buffer: Vec<u8>,
}

impl ByteStreamMuxer {
    pub fn new(extension: &'static str) -> Self {
        Self {
            extension,
            buffer: Vec::new(),
        }
    }
}

impl ContainerMuxer for ByteStreamMuxer {
    fn extension(&self) -> &'static str {
        self.extension
    }

    fn begin(&mut self, _config: &EncoderConfig) -> LumaResult<()> {
        self.buffer.clear();
        Ok(())
    }

    fn add_chunk(&mut self, chunk: EncodedChunk) -> LumaResult<()> {
        self.buffer.extend_from_slice(&chunk.data);
        Ok(())
    }

    fn finalize(&mut self) -> LumaResult<Vec<u8>> {
        if self.buffer.is_empty() {
            return Err(LumaError::encode("encoder produced no output"));
        }
        Ok(std::mem::take(&mut self.buffer))
    }

    fn discard(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_args_for_hd() {
        let config = EncoderConfig::select(1920, 1080, 20_000_000, 30);
        let args = h264_args(&config);
        assert_eq!(arg_after(&args, "-s"), Some("1920x1080"));
        assert_eq!(arg_after(&args, "-level:v"), Some("4.0"));
        assert_eq!(arg_after(&args, "-b:v"), Some("20000k"));
        assert_eq!(arg_after(&args, "-bf"), Some("0"));
        assert_eq!(arg_after(&args, "-g"), Some("60"));
        assert_eq!(
            arg_after(&args, "-force_key_frames"),
            Some("expr:gte(t,n_forced*2)")
        );
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_args_for_upscaled_4k() {
        let config = EncoderConfig::select(3840, 2160, 20_000_000, 24);
        let args = h264_args(&config);
        assert_eq!(arg_after(&args, "-level:v"), Some("5.2"));
        assert_eq!(arg_after(&args, "-b:v"), Some("40000k"));
        assert_eq!(arg_after(&args, "-g"), Some("48"));
    }

    #[test]
    fn test_byte_stream_muxer() {
        let config = EncoderConfig::select(2, 2, 1_000_000, 30);
        let mut muxer = ByteStreamMuxer::new("mp4");
        muxer.begin(&config).unwrap();
        assert!(muxer.finalize().is_err());
        for part in [b"ftyp".to_vec(), b"moof".to_vec()] {
            muxer
                .add_chunk(EncodedChunk {
                    data: part,
                    timestamp_micros: 0,
                    duration_micros: 1,
                    keyframe: true,
                })
                .unwrap();
        }
        assert_eq!(muxer.finalize().unwrap(), b"ftypmoof".to_vec());
    }

    #[tokio::test]
    async fn test_encode_before_configure_fails() {
        let mut encoder = FfmpegH264Encoder::new();
        let frame = Frame::new(image::RgbaImage::new(2, 2), 0, 1);
        assert!(encoder.encode(&frame, true).await.is_err());
        assert!(encoder.flush().await.is_err());
        // reset without a running process is a no-op
        encoder.reset();
    }
}

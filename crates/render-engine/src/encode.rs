//! The encode pipeline state machine.
//!
//! ```text
//! Idle ──configure──▶ Encoding ──finish──▶ Muxing ──▶ Complete
//!   ▲                   │  │                 │
//!   └──────cancel───────┘  └──────▶ Error ◀──┘
//! ```
//!
//! Frames are submitted in display order with no reordering. The encoder
//! is expected to emit chunks in submission order; chunk timestamps are
//! checked and a regression fails the job.

use lumagrade_common::error::{LumaError, LumaResult};
use serde::Serialize;

use crate::frame::Frame;

/// Output pixel count above which the higher codec level is selected.
pub const HIGH_LEVEL_PIXEL_THRESHOLD: u64 = 2_097_152;

/// Seconds of output between forced keyframes.
pub const KEYFRAME_INTERVAL_SECS: u32 = 2;

/// H.264 profile and level for an output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodecProfile {
    /// RFC 6381 codec string.
    pub codec: &'static str,
    /// Level as used by encoder options, e.g. `4.0`.
    pub level: &'static str,
}

impl CodecProfile {
    pub const HIGH_L40: CodecProfile = CodecProfile {
        codec: "avc1.640028",
        level: "4.0",
    };

    pub const HIGH_L52: CodecProfile = CodecProfile {
        codec: "avc1.640034",
        level: "5.2",
    };
}

/// Everything an encoder and muxer need to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Effective bits per second after the level adjustment.
    pub bitrate: u64,
    pub profile: CodecProfile,
}

impl EncoderConfig {
    /// Pick the codec level for the output size.
    ///
    /// Outputs above [`HIGH_LEVEL_PIXEL_THRESHOLD`] pixels use level 5.2
    /// and twice the requested bitrate.
    pub fn select(width: u32, height: u32, bitrate: u64, fps: u32) -> Self {
        let pixels = width as u64 * height as u64;
        let (profile, bitrate) = if pixels > HIGH_LEVEL_PIXEL_THRESHOLD {
            (CodecProfile::HIGH_L52, bitrate.saturating_mul(2))
        } else {
            (CodecProfile::HIGH_L40, bitrate)
        };
        Self {
            width,
            height,
            fps,
            bitrate,
            profile,
        }
    }

    /// Frames between forced keyframes.
    pub fn keyframe_interval(&self) -> u64 {
        (self.fps.max(1) * KEYFRAME_INTERVAL_SECS) as u64
    }
}

/// Whether output frame `index` must be a keyframe at `fps`.
pub fn is_keyframe(index: u64, fps: u32) -> bool {
    index % (fps.max(1) * KEYFRAME_INTERVAL_SECS) as u64 == 0
}

/// Encoder output for one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
    pub timestamp_micros: i64,
    pub duration_micros: i64,
    pub keyframe: bool,
}

/// A video encoder.
#[async_trait::async_trait]
pub trait VideoEncoder: Send {
    fn name(&self) -> &str;

    /// Check if this encoder can run on the system.
    fn is_available(&self) -> bool;

    async fn configure(&mut self, config: &EncoderConfig) -> LumaResult<()>;

    /// Encode one frame. May return zero or more chunks.
    async fn encode(&mut self, frame: &Frame, keyframe: bool) -> LumaResult<Vec<EncodedChunk>>;

    /// Drain buffered output and close the encoder.
    async fn flush(&mut self) -> LumaResult<Vec<EncodedChunk>>;

    /// Drop all buffered state. Must not fail.
    fn reset(&mut self);
}

/// A container writer.
pub trait ContainerMuxer: Send {
    /// File extension of the finished container, without the dot.
    fn extension(&self) -> &'static str;

    fn begin(&mut self, config: &EncoderConfig) -> LumaResult<()>;

    fn add_chunk(&mut self, chunk: EncodedChunk) -> LumaResult<()>;

    /// Finish the container and return its bytes.
    fn finalize(&mut self) -> LumaResult<Vec<u8>>;

    /// Throw away everything written so far.
    fn discard(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Encoding,
    Muxing,
    Complete,
    Error,
}

/// Drives an encoder and muxer through one job at a time.
pub struct EncodePipeline {
    encoder: Box<dyn VideoEncoder>,
    muxer: Box<dyn ContainerMuxer>,
    state: PipelineState,
    config: Option<EncoderConfig>,
    frames_submitted: u64,
    last_frame_timestamp: Option<i64>,
    last_chunk_timestamp: Option<i64>,
    chunks_muxed: u64,
    error_message: Option<String>,
}

impl EncodePipeline {
    pub fn new(encoder: Box<dyn VideoEncoder>, muxer: Box<dyn ContainerMuxer>) -> Self {
        Self {
            encoder,
            muxer,
            state: PipelineState::Idle,
            config: None,
            frames_submitted: 0,
            last_frame_timestamp: None,
            last_chunk_timestamp: None,
            chunks_muxed: 0,
            error_message: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn config(&self) -> Option<&EncoderConfig> {
        self.config.as_ref()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn extension(&self) -> &'static str {
        self.muxer.extension()
    }

    pub fn encoder_name(&self) -> &str {
        self.encoder.name()
    }

    pub fn is_available(&self) -> bool {
        self.encoder.is_available()
    }

    /// Start a job: `Idle -> Encoding`.
    ///
    /// Also accepted from `Complete` or `Error`, which starts a new job.
    pub async fn configure(
        &mut self,
        width: u32,
        height: u32,
        bitrate: u64,
        fps: u32,
    ) -> LumaResult<EncoderConfig> {
        if matches!(self.state, PipelineState::Encoding | PipelineState::Muxing) {
            return Err(LumaError::encode(format!(
                "pipeline is busy ({:?})",
                self.state
            )));
        }
        self.frames_submitted = 0;
        self.last_frame_timestamp = None;
        self.last_chunk_timestamp = None;
        self.chunks_muxed = 0;
        self.error_message = None;

        let config = EncoderConfig::select(width, height, bitrate, fps);
        let started = match self.encoder.configure(&config).await {
            Ok(()) => self.muxer.begin(&config),
            Err(err) => Err(err),
        };
        if let Err(err) = started {
            self.encoder.reset();
            return Err(self.fail(err));
        }

        tracing::info!(
            encoder = self.encoder.name(),
            width,
            height,
            fps,
            bitrate = config.bitrate,
            codec = config.profile.codec,
            "Encoder configured"
        );
        self.config = Some(config);
        self.state = PipelineState::Encoding;
        Ok(config)
    }

    /// Encode the next frame. Returns whether it was sent as a keyframe.
    pub async fn submit(&mut self, frame: &Frame) -> LumaResult<bool> {
        self.expect_state(PipelineState::Encoding, "submit")?;
        let Some(config) = self.config else {
            return Err(self.fail(LumaError::encode("pipeline has no configuration")));
        };

        if frame.dimensions() != (config.width, config.height) {
            return Err(self.fail(LumaError::encode(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                config.width,
                config.height
            ))));
        }
        if self
            .last_frame_timestamp
            .is_some_and(|last| frame.timestamp_micros <= last)
        {
            return Err(self.fail(LumaError::encode(format!(
                "frame timestamp {} is not after {}",
                frame.timestamp_micros,
                self.last_frame_timestamp.unwrap_or_default()
            ))));
        }

        let keyframe = is_keyframe(self.frames_submitted, config.fps);
        let chunks = match self.encoder.encode(frame, keyframe).await {
            Ok(chunks) => chunks,
            Err(err) => return Err(self.fail(err)),
        };
        self.mux_chunks(chunks)?;

        self.last_frame_timestamp = Some(frame.timestamp_micros);
        self.frames_submitted += 1;
        Ok(keyframe)
    }

    /// Flush, close and finalize: `Encoding -> Muxing -> Complete`.
    pub async fn finish(&mut self) -> LumaResult<Vec<u8>> {
        self.expect_state(PipelineState::Encoding, "finish")?;

        let tail = match self.encoder.flush().await {
            Ok(chunks) => chunks,
            Err(err) => return Err(self.fail(err)),
        };
        self.mux_chunks(tail)?;
        self.state = PipelineState::Muxing;

        let bytes = match self.muxer.finalize() {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.fail(err)),
        };
        self.state = PipelineState::Complete;
        tracing::info!(
            frames = self.frames_submitted,
            chunks = self.chunks_muxed,
            bytes = bytes.len(),
            "Container finalized"
        );
        Ok(bytes)
    }

    /// Stop the job without output: back to `Idle`.
    pub fn cancel(&mut self) {
        if matches!(self.state, PipelineState::Encoding | PipelineState::Muxing) {
            self.encoder.reset();
            self.muxer.discard();
            tracing::info!(frames = self.frames_submitted, "Encode cancelled");
        }
        self.state = PipelineState::Idle;
        self.config = None;
    }

    /// Fail the job from outside (e.g. a decode error).
    pub fn abort(&mut self, err: LumaError) -> LumaError {
        self.fail(err)
    }

    fn mux_chunks(&mut self, chunks: Vec<EncodedChunk>) -> LumaResult<()> {
        for chunk in chunks {
            if self
                .last_chunk_timestamp
                .is_some_and(|last| chunk.timestamp_micros < last)
            {
                return Err(self.fail(LumaError::encode(format!(
                    "encoder emitted chunk at {} after {}; output would be out of order",
                    chunk.timestamp_micros,
                    self.last_chunk_timestamp.unwrap_or_default()
                ))));
            }
            self.last_chunk_timestamp = Some(chunk.timestamp_micros);
            if let Err(err) = self.muxer.add_chunk(chunk) {
                return Err(self.fail(err));
            }
            self.chunks_muxed += 1;
        }
        Ok(())
    }

    fn expect_state(&mut self, expected: PipelineState, op: &str) -> LumaResult<()> {
        if self.state == expected {
            return Ok(());
        }
        Err(LumaError::encode(format!(
            "cannot {op} while pipeline is {:?}",
            self.state
        )))
    }

    fn fail(&mut self, err: LumaError) -> LumaError {
        if matches!(self.state, PipelineState::Encoding | PipelineState::Muxing) {
            self.encoder.reset();
            self.muxer.discard();
        }
        tracing::error!(error = %err, state = ?self.state, "Encode pipeline failed");
        self.state = PipelineState::Error;
        self.error_message = Some(err.to_string());
        err
    }
}

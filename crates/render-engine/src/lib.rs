//! Lumagrade Render Engine
//!
//! Offline export pipeline that turns a source video plus grading
//! decisions (color settings, technical and creative LUTs, optional 2x
//! upscale) into an encoded video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──► MediaDecoder ──► FrameSource (realtime | deterministic)
//!                                        │
//!                                        ▼
//!                              FrameProcessor
//!                         ├── Upscale 2x (model or resize fallback)
//!                         ├── Technical LUT
//!                         ├── Grade (exposure .. shadows)
//!                         └── Creative LUT
//!                                        │
//!                                        ▼
//!                              EncodePipeline
//!                         ├── VideoEncoder (H.264 | raw I420)
//!                         └── ContainerMuxer (MP4 | Y4M)
//!                                        │
//!                                        ▼
//!                              ArtifactSink ──► output.mp4
//! ```
//!
//! [`ExportController`] drives one job at a time and publishes
//! [`ExportProgress`] on a watch channel.

pub mod backends;
pub mod decode;
pub mod encode;
pub mod export;
pub mod frame;
pub mod job;
pub mod processor;
pub mod sink;
pub mod source;

pub use backends::EncoderKind;
pub use decode::{FfmpegDecoder, MediaDecoder, MediaInfo, Presentation};
pub use encode::{
    CodecProfile, ContainerMuxer, EncodePipeline, EncodedChunk, EncoderConfig, PipelineState,
    VideoEncoder,
};
pub use export::{
    CancelHandle, ControllerOptions, ExportController, ExportIo, ExportOutcome, ExportProgress,
    ExportStatus,
};
pub use frame::Frame;
pub use job::{
    estimate_export_time_secs, estimate_file_size_bytes, ExportJob, ExportQuality, ExportRequest,
    FrameStrategy,
};
pub use processor::FrameProcessor;
pub use sink::{Artifact, ArtifactSink, FileSink, MemorySink};
pub use source::{open_frame_source, FrameSource};

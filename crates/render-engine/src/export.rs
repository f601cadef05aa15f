//! Export orchestration.
//!
//! [`ExportController`] runs one job at a time: it pulls frames from the
//! selected [`FrameSource`](crate::source::FrameSource), transforms them
//! with a [`FrameProcessor`], feeds the [`EncodePipeline`], and hands the
//! finished container to an [`ArtifactSink`]. Progress is published on a
//! watch channel; cancellation is a flag checked once per frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lumagrade_common::clock::{micros_to_secs, ExportClock};
use lumagrade_common::config::ExportDefaults;
use lumagrade_common::error::{LumaError, LumaResult};
use lumagrade_upscale::SuperResolutionModel;
use serde::Serialize;
use tokio::sync::watch;

use crate::decode::MediaDecoder;
use crate::encode::EncodePipeline;
use crate::job::{ExportJob, ExportRequest};
use crate::processor::FrameProcessor;
use crate::sink::{Artifact, ArtifactSink};
use crate::source::{open_frame_source, DEFAULT_PLAYBACK_RATE};

/// Job status as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    #[default]
    Idle,
    Encoding,
    Muxing,
    Complete,
    Error,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub status: ExportStatus,

    /// Frames submitted to the encoder so far.
    pub current_frame: u64,

    /// Expected total. For realtime capture this is an estimate and is
    /// raised if exceeded.
    pub total_frames: u64,

    /// Informational only; never used to stop a job.
    pub estimated_seconds_remaining: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExportProgress {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.status == ExportStatus::Complete {
            return 1.0;
        }
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }
}

/// How an export call ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Complete {
        frames: u64,
        bytes: usize,
        /// Frames resized without the model after an inference failure.
        fallback_frames: u64,
    },
    Cancelled {
        frames: u64,
    },
}

/// Requests cancellation of the running export.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning for the export loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOptions {
    /// Playback rate for realtime capture.
    pub playback_rate: f64,

    /// Yield to the runtime after this many frames. 0 disables.
    pub yield_every_frames: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            playback_rate: DEFAULT_PLAYBACK_RATE,
            yield_every_frames: 4,
        }
    }
}

impl From<&ExportDefaults> for ControllerOptions {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            playback_rate: defaults.realtime_playback_rate,
            yield_every_frames: defaults.yield_every_frames,
        }
    }
}

/// Collaborators for one export call.
pub struct ExportIo<'a> {
    /// Exclusively borrowed for the whole job.
    pub decoder: &'a mut dyn MediaDecoder,
    pub pipeline: EncodePipeline,
    /// Required when the request enables upscaling.
    pub upscaler: Option<SuperResolutionModel>,
    pub sink: &'a mut dyn ArtifactSink,
}

/// Runs export jobs and reports their progress.
pub struct ExportController {
    progress: watch::Sender<ExportProgress>,
    cancel: Arc<AtomicBool>,
    options: ControllerOptions,
}

impl Default for ExportController {
    fn default() -> Self {
        Self::new(ControllerOptions::default())
    }
}

impl ExportController {
    pub fn new(options: ControllerOptions) -> Self {
        let (progress, _) = watch::channel(ExportProgress::idle());
        Self {
            progress,
            cancel: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Receive every progress update.
    pub fn subscribe(&self) -> watch::Receiver<ExportProgress> {
        self.progress.subscribe()
    }

    /// Latest progress snapshot.
    pub fn progress(&self) -> ExportProgress {
        self.progress.borrow().clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Ask the running export to stop after the current frame.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Return the observable state to idle.
    pub fn reset_progress(&self) {
        self.progress.send_replace(ExportProgress::idle());
    }

    /// Run one export job to completion, cancellation, or failure.
    ///
    /// Failures set the status to `Error` with a message and are returned.
    /// Cancellation resets the status to `Idle` and returns
    /// [`ExportOutcome::Cancelled`]; the sink is not called.
    pub async fn export(
        &self,
        request: &ExportRequest,
        io: ExportIo<'_>,
    ) -> LumaResult<ExportOutcome> {
        let ExportIo {
            decoder,
            mut pipeline,
            mut upscaler,
            sink,
        } = io;

        self.cancel.store(false, Ordering::SeqCst);
        self.reset_progress();

        let info = decoder.info().await.map_err(|e| self.fail(e))?;
        let job = ExportJob::resolve(request, &info).map_err(|e| self.fail(e))?;

        if !pipeline.is_available() {
            return Err(self.fail(LumaError::validation(format!(
                "encoder '{}' is not available on this system",
                pipeline.encoder_name()
            ))));
        }

        if job.upscale_enabled {
            let Some(model) = upscaler.as_mut() else {
                return Err(self.fail(LumaError::validation(
                    "upscaling was requested but no model is configured",
                )));
            };
            if let Err(e) = model.load_model().await {
                return Err(self.fail(LumaError::model(format!(
                    "{e}; disable upscaling to export without it"
                ))));
            }
        }

        tracing::info!(
            width = job.target_width,
            height = job.target_height,
            fps = job.fps,
            bitrate = job.bitrate,
            strategy = %job.strategy,
            codec = %job.codec,
            upscale = job.upscale_enabled,
            duration_secs = job.duration_secs,
            "Starting export"
        );

        pipeline
            .configure(job.target_width, job.target_height, job.bitrate, job.fps)
            .await
            .map_err(|e| self.fail(e))?;

        let mut processor = FrameProcessor::new(&job, upscaler);
        let mut source = open_frame_source(&job, decoder, self.options.playback_rate);
        let mut total = source.total_frames();
        let clock = ExportClock::start();
        let mut done = 0u64;
        let mut output_end_micros = 0i64;

        self.publish(ExportStatus::Encoding, done, total, 0.0);

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                if let Err(e) = source.close().await {
                    tracing::warn!(error = %e, "Failed to stop source after cancel");
                }
                pipeline.cancel();
                self.reset_progress();
                tracing::info!(frames = done, "Export cancelled");
                return Ok(ExportOutcome::Cancelled { frames: done });
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    let _ = source.close().await;
                    return Err(self.fail(pipeline.abort(e)));
                }
            };

            let frame = processor.process(frame).await;
            if let Err(e) = pipeline.submit(&frame).await {
                let _ = source.close().await;
                return Err(self.fail(e));
            }

            done += 1;
            output_end_micros = frame.timestamp_micros + frame.duration_micros;
            total = total.max(done);
            let eta = clock.estimate_remaining_secs(done, total);
            self.publish(ExportStatus::Encoding, done, total, eta);

            let yield_every = self.options.yield_every_frames as u64;
            if yield_every > 0 && done % yield_every == 0 {
                tokio::task::yield_now().await;
            }
        }

        if let Err(e) = source.close().await {
            tracing::warn!(error = %e, "Failed to stop source");
        }
        drop(source);

        if done == 0 {
            return Err(self.fail(pipeline.abort(LumaError::decode("source produced no frames"))));
        }

        self.publish(ExportStatus::Muxing, done, done, 0.0);
        let bytes = pipeline.finish().await.map_err(|e| self.fail(e))?;
        let size = bytes.len();

        sink.save(Artifact {
            bytes,
            extension: pipeline.extension(),
        })
        .await
        .map_err(|e| self.fail(e))?;

        self.publish(ExportStatus::Complete, done, done, 0.0);

        let fallback_frames = processor.fallback_frames();
        if let Some(mut model) = processor.into_upscaler() {
            model.dispose();
        }
        tracing::info!(
            frames = done,
            bytes = size,
            fallback_frames,
            output_secs = micros_to_secs(output_end_micros),
            started_at = clock.epoch_wall(),
            elapsed_secs = clock.elapsed_secs(),
            "Export complete"
        );

        Ok(ExportOutcome::Complete {
            frames: done,
            bytes: size,
            fallback_frames,
        })
    }

    fn publish(&self, status: ExportStatus, current: u64, total: u64, eta: f64) {
        self.progress.send_replace(ExportProgress {
            status,
            current_frame: current,
            total_frames: total,
            estimated_seconds_remaining: eta,
            error_message: None,
        });
    }

    fn fail(&self, err: LumaError) -> LumaError {
        tracing::error!(error = %err, "Export failed");
        self.progress.send_modify(|p| {
            p.status = ExportStatus::Error;
            p.estimated_seconds_remaining = 0.0;
            p.error_message = Some(err.to_string());
        });
        err
    }
}

//! Per-frame transform: optional 2x upscale, then the LUT stack.

use image::imageops::{self, FilterType};
use lumagrade_color::{ColorSettings, LutStack};
use lumagrade_upscale::{SuperResolutionModel, UpscaleError};

use crate::frame::Frame;
use crate::job::ExportJob;

/// Applies a job's upscale and grade to each frame.
pub struct FrameProcessor {
    settings: ColorSettings,
    stack: LutStack,
    target: (u32, u32),
    upscaler: Option<SuperResolutionModel>,
    fallback_frames: u64,
}

impl FrameProcessor {
    /// `upscaler` is used only when the job has upscaling enabled.
    pub fn new(job: &ExportJob, upscaler: Option<SuperResolutionModel>) -> Self {
        Self {
            settings: job.color_settings,
            stack: job.lut_stack.clone(),
            target: (job.target_width, job.target_height),
            upscaler: if job.upscale_enabled { upscaler } else { None },
            fallback_frames: 0,
        }
    }

    /// Frames that were resized instead of upscaled by the model.
    pub fn fallback_frames(&self) -> u64 {
        self.fallback_frames
    }

    /// Release the model, if any.
    pub fn into_upscaler(self) -> Option<SuperResolutionModel> {
        self.upscaler
    }

    /// Transform one frame. Output dimensions always equal the job target.
    ///
    /// An inference failure falls back to a plain resize for this frame
    /// only; it never fails the job.
    pub async fn process(&mut self, frame: Frame) -> Frame {
        let Frame {
            mut pixels,
            timestamp_micros,
            duration_micros,
        } = frame;

        if let Some(model) = &self.upscaler {
            pixels = match model.upscale(&pixels).await {
                Ok(upscaled) => upscaled,
                Err(err) => {
                    self.fallback_frames += 1;
                    match &err {
                        UpscaleError::Inference(_) => tracing::warn!(
                            timestamp_micros,
                            error = %err,
                            "Inference failed; resizing frame instead"
                        ),
                        UpscaleError::Model(_) => tracing::error!(
                            timestamp_micros,
                            error = %err,
                            "Model unavailable; resizing frame instead"
                        ),
                    }
                    SuperResolutionModel::resize_fallback(&pixels)
                }
            };
        }

        let (tw, th) = self.target;
        if pixels.dimensions() != (tw, th) {
            pixels = imageops::resize(&pixels, tw, th, FilterType::Triangle);
        }

        self.stack.apply_rgba8(&mut pixels, &self.settings);

        Frame {
            pixels,
            timestamp_micros,
            duration_micros,
        }
    }
}

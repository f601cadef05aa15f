//! Frame acquisition strategies.
//!
//! Both strategies implement [`FrameSource`] and yield one [`Frame`] per
//! call, in non-decreasing timestamp order. The controller picks one via
//! [`open_frame_source`] and never branches on the strategy itself.

use std::collections::VecDeque;

use image::RgbaImage;
use lumagrade_common::clock::{self, CaptureGate};
use lumagrade_common::error::LumaResult;

use crate::decode::MediaDecoder;
use crate::frame::Frame;
use crate::job::{ExportJob, FrameStrategy};

/// Playback stops this far before the end of the source.
pub const REALTIME_END_MARGIN_SECS: f64 = 0.1;

/// Default accelerated playback rate for realtime capture.
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.3;

/// A pull-based stream of source frames.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    fn strategy(&self) -> FrameStrategy;

    /// Expected frame count. Exact for deterministic capture, an estimate
    /// for realtime capture.
    fn total_frames(&self) -> u64;

    /// Next frame, or `None` when the source is exhausted.
    async fn next_frame(&mut self) -> LumaResult<Option<Frame>>;

    /// Release the decoder (stop playback). Safe to call more than once.
    async fn close(&mut self) -> LumaResult<()>;
}

/// Build the frame source for `job`, borrowing `decoder` exclusively.
pub fn open_frame_source<'a>(
    job: &ExportJob,
    decoder: &'a mut dyn MediaDecoder,
    playback_rate: f64,
) -> Box<dyn FrameSource + 'a> {
    match job.strategy {
        FrameStrategy::Deterministic => Box::new(DeterministicSource::new(
            decoder,
            job.fps,
            job.duration_secs,
        )),
        FrameStrategy::Realtime => Box::new(RealtimeSource::new(
            decoder,
            job.fps,
            job.duration_secs,
            playback_rate,
        )),
    }
}

/// Seek-and-capture for every output frame time.
pub struct DeterministicSource<'a> {
    decoder: &'a mut dyn MediaDecoder,
    fps: u32,
    total: u64,
    next_index: u64,
}

impl<'a> DeterministicSource<'a> {
    pub fn new(decoder: &'a mut dyn MediaDecoder, fps: u32, duration_secs: f64) -> Self {
        Self {
            decoder,
            fps,
            total: clock::total_frames(duration_secs, fps),
            next_index: 0,
        }
    }
}

#[async_trait::async_trait]
impl<'a> FrameSource for DeterministicSource<'a> {
    fn strategy(&self) -> FrameStrategy {
        FrameStrategy::Deterministic
    }

    fn total_frames(&self) -> u64 {
        self.total
    }

    async fn next_frame(&mut self) -> LumaResult<Option<Frame>> {
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        let secs = index as f64 / self.fps as f64;

        self.decoder.seek(secs).await?;
        let pixels = self.decoder.capture().await?;
        self.next_index += 1;

        Ok(Some(Frame::new(
            pixels,
            clock::frame_timestamp_micros(index, self.fps),
            clock::frame_duration_micros(self.fps),
        )))
    }

    async fn close(&mut self) -> LumaResult<()> {
        Ok(())
    }
}

/// Capture presented frames during accelerated playback.
///
/// A presentation is captured when at least `0.8 / fps` seconds of wall
/// time have passed since the previous capture. Captures are placed on the
/// output frame grid by media time; grid slots skipped by the gate repeat
/// the previous capture so the output keeps the source's timing.
pub struct RealtimeSource<'a> {
    decoder: &'a mut dyn MediaDecoder,
    fps: u32,
    duration_secs: f64,
    playback_rate: f64,
    gate: CaptureGate,
    state: PlaybackState,
    last_slot: Option<u64>,
    held: Option<RgbaImage>,
    pending: VecDeque<Frame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackState {
    NotStarted,
    Playing,
    Finished,
}

impl<'a> RealtimeSource<'a> {
    pub fn new(
        decoder: &'a mut dyn MediaDecoder,
        fps: u32,
        duration_secs: f64,
        playback_rate: f64,
    ) -> Self {
        Self {
            decoder,
            fps,
            duration_secs,
            playback_rate,
            gate: CaptureGate::new(fps),
            state: PlaybackState::NotStarted,
            last_slot: None,
            held: None,
            pending: VecDeque::new(),
        }
    }

    async fn finish(&mut self) -> LumaResult<()> {
        if self.state == PlaybackState::Playing {
            self.decoder.pause().await?;
        }
        self.state = PlaybackState::Finished;
        Ok(())
    }

    fn grid_frame(&self, pixels: RgbaImage, slot: u64) -> Frame {
        Frame::new(
            pixels,
            clock::frame_timestamp_micros(slot, self.fps),
            clock::frame_duration_micros(self.fps),
        )
    }

    /// Queue `pixels` at `slot`, filling any skipped slots before it.
    fn place(&mut self, pixels: RgbaImage, slot: u64) {
        let first = self.last_slot.map_or(0, |last| last + 1);
        if slot > first {
            tracing::trace!(from = first, to = slot, "Repeating frame over skipped slots");
            let fill = self.held.take().unwrap_or_else(|| pixels.clone());
            for gap in first..slot {
                let frame = self.grid_frame(fill.clone(), gap);
                self.pending.push_back(frame);
            }
        }
        self.held = Some(pixels.clone());
        self.last_slot = Some(slot);
        let frame = self.grid_frame(pixels, slot);
        self.pending.push_back(frame);
    }
}

#[async_trait::async_trait]
impl<'a> FrameSource for RealtimeSource<'a> {
    fn strategy(&self) -> FrameStrategy {
        FrameStrategy::Realtime
    }

    fn total_frames(&self) -> u64 {
        clock::total_frames(self.duration_secs, self.fps)
    }

    async fn next_frame(&mut self) -> LumaResult<Option<Frame>> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }
        match self.state {
            PlaybackState::Finished => return Ok(None),
            PlaybackState::NotStarted => {
                self.decoder.seek(0.0).await?;
                self.decoder.play(self.playback_rate).await?;
                self.state = PlaybackState::Playing;
                tracing::debug!(rate = self.playback_rate, "Realtime capture started");
            }
            PlaybackState::Playing => {}
        }

        let end_secs = self.duration_secs - REALTIME_END_MARGIN_SECS;
        loop {
            let Some(presentation) = self.decoder.next_presentation().await? else {
                self.finish().await?;
                return Ok(None);
            };
            if presentation.media_time_secs >= end_secs {
                self.finish().await?;
                return Ok(None);
            }

            let slot = clock::frame_index_at(presentation.media_time_secs, self.fps);
            if self.last_slot.is_some_and(|last| slot <= last) {
                continue;
            }
            if !self.gate.should_capture(presentation.wall_time) {
                continue;
            }

            let pixels = self.decoder.capture().await?;
            self.place(pixels, slot);
            return Ok(self.pending.pop_front());
        }
    }

    async fn close(&mut self) -> LumaResult<()> {
        self.pending.clear();
        self.held = None;
        self.finish().await
    }
}

//! Clock and timing utilities for frame timestamps and capture pacing.
//!
//! Export timestamps are integer microseconds measured from the start of
//! the source. This module provides:
//! - An export clock for progress/ETA reporting
//! - Conversions between seconds, frame indices, and microseconds
//! - A capture gate used to pace realtime frame capture

use std::time::{Duration, Instant};

/// Wall-clock timer for a single export job.
#[derive(Debug, Clone)]
pub struct ExportClock {
    /// The instant the job started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl ExportClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the job started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at job start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Estimate remaining seconds from the work done so far.
    ///
    /// Returns 0 until at least one unit of work has completed.
    pub fn estimate_remaining_secs(&self, done: u64, total: u64) -> f64 {
        estimate_remaining_secs(self.elapsed_secs(), done, total)
    }
}

/// Remaining-time estimate: average time per unit times units left.
pub fn estimate_remaining_secs(elapsed_secs: f64, done: u64, total: u64) -> f64 {
    if done == 0 || total <= done {
        return 0.0;
    }
    let per_unit = elapsed_secs / done as f64;
    (per_unit * (total - done) as f64).max(0.0)
}

/// Convert seconds to microseconds, rounding to the nearest microsecond.
pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * 1_000_000.0).round() as i64
}

/// Convert microseconds to seconds.
pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Presentation timestamp of output frame `index` at `fps`.
pub fn frame_timestamp_micros(index: u64, fps: u32) -> i64 {
    ((index as f64 * 1_000_000.0) / fps.max(1) as f64).round() as i64
}

/// Output frame index nearest to `secs` at `fps`.
pub fn frame_index_at(secs: f64, fps: u32) -> u64 {
    (secs.max(0.0) * fps.max(1) as f64).round() as u64
}

/// Nominal duration of one output frame at `fps`.
pub fn frame_duration_micros(fps: u32) -> i64 {
    (1_000_000.0 / fps.max(1) as f64).round() as i64
}

/// Number of output frames for a source of `duration_secs` at `fps`.
pub fn total_frames(duration_secs: f64, fps: u32) -> u64 {
    if duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs * fps.max(1) as f64).ceil() as u64
}

/// Paces realtime capture against presentation wall times.
///
/// A presentation is accepted when at least `tolerance / fps` seconds of
/// wall time have passed since the previously accepted one.
#[derive(Debug)]
pub struct CaptureGate {
    min_interval: Duration,
    last_accepted: Option<Duration>,
}

impl CaptureGate {
    /// Fraction of the nominal frame interval that must elapse between captures.
    pub const DEFAULT_TOLERANCE: f64 = 0.8;

    /// Create a gate targeting `fps` with the default tolerance.
    pub fn new(fps: u32) -> Self {
        Self::with_tolerance(fps, Self::DEFAULT_TOLERANCE)
    }

    pub fn with_tolerance(fps: u32, tolerance: f64) -> Self {
        let interval_secs = tolerance / fps.max(1) as f64;
        Self {
            min_interval: Duration::from_secs_f64(interval_secs.max(0.0)),
            last_accepted: None,
        }
    }

    /// Check a presentation at `wall_time` (relative to playback start).
    /// Returns true and records it if accepted. The first call always accepts.
    pub fn should_capture(&mut self, wall_time: Duration) -> bool {
        match self.last_accepted {
            None => {
                self.last_accepted = Some(wall_time);
                true
            }
            Some(last) if wall_time.saturating_sub(last) >= self.min_interval => {
                self.last_accepted = Some(wall_time);
                true
            }
            _ => false,
        }
    }

    /// Minimum interval between accepted presentations.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

//! Lumagrade Common Utilities
//!
//! Shared infrastructure for all Lumagrade crates:
//! - Error taxonomy and result alias
//! - Timing utilities for frame timestamps and capture pacing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;

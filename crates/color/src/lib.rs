//! Lumagrade Color: the per-pixel grading core
//!
//! Everything a frame goes through between decode and encode:
//! - **Color science:** exposure, contrast, saturation, vibrance,
//!   temperature, tint, highlights, shadows ([`grade`])
//! - **3D LUTs:** `.cube` parsing, trilinear sampling, intensity blending
//! - **LUT stack:** technical LUT, then grade, then creative LUT
//! - **Shader generation:** the same math emitted as GLSL for live preview
//!
//! This crate is pure computation. The CPU evaluator and the generated
//! shader read their numbers from [`constants`], so the preview and the
//! export path apply identical formulas.

pub mod constants;
pub mod grade;
pub mod lut;
pub mod pixel;
pub mod presets;
pub mod settings;
pub mod shader;
pub mod stack;

pub use grade::{grade, Grade};
pub use lut::{LutParseError, LutTable};
pub use pixel::Rgb;
pub use presets::{builtin_presets, preset, LutKind, LutPreset};
pub use settings::ColorSettings;
pub use stack::{LutStack, LutStage};

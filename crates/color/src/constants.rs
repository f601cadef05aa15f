//! Numeric constants of the grading math.
//!
//! Read by both the CPU evaluator ([`crate::grade`]) and the GLSL
//! generator ([`crate::shader`]). Changing a value here changes both paths.

/// Rec.709 luminance coefficients.
pub const LUMA_R: f32 = 0.2126;
pub const LUMA_G: f32 = 0.7152;
pub const LUMA_B: f32 = 0.0722;

/// Stops-to-gain scale: gain is `2^(exposure * EXPOSURE_SENSITIVITY)`.
pub const EXPOSURE_SENSITIVITY: f32 = 0.13;

/// Red/blue shift at temperature = +/-100.
pub const TEMPERATURE_SHIFT: f32 = 0.1;

/// Green shift at tint = +/-100.
pub const TINT_GREEN_SHIFT: f32 = 0.1;
/// Red and blue shift at tint = +/-100.
pub const TINT_MAGENTA_SHIFT: f32 = 0.05;

/// Highlights mask is `smoothstep(LOW, HIGH, L)`.
pub const HIGHLIGHTS_MASK_LOW: f32 = 0.2;
pub const HIGHLIGHTS_MASK_HIGH: f32 = 1.0;
pub const HIGHLIGHTS_STRENGTH: f32 = 0.5;
pub const HIGHLIGHTS_GAIN: f32 = 2.0;

/// Shadows mask is `1 - smoothstep(LOW, HIGH, L)`.
pub const SHADOWS_MASK_LOW: f32 = 0.0;
pub const SHADOWS_MASK_HIGH: f32 = 0.5;
pub const SHADOWS_STRENGTH: f32 = 0.5;
pub const SHADOWS_GAIN: f32 = 0.1;

/// Inclusive range of the exposure control, in stops.
pub const EXPOSURE_RANGE: (f32, f32) = (-2.0, 2.0);

/// Inclusive range of every percentage control.
pub const PERCENT_RANGE: (f32, f32) = (-100.0, 100.0);

/// Inclusive range of LUT intensity.
pub const INTENSITY_RANGE: (f32, f32) = (0.0, 100.0);

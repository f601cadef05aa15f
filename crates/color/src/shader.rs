//! GLSL generation for the live preview.
//!
//! The fragment shader is assembled from [`crate::constants`], so a GPU
//! preview and the CPU export path evaluate the same formulas. Stage order
//! in `main` mirrors [`crate::stack::LutStack::apply_pixel`].

use serde::Serialize;

use crate::constants::*;
use crate::lut::LutTable;
use crate::settings::ColorSettings;
use crate::stack::{LutStack, LutStage};

/// GLSL float literal. Debug formatting always keeps a decimal point.
fn lit(v: f32) -> String {
    format!("{v:?}")
}

/// GLSL ES 3.0 fragment shader: technical LUT, grade, creative LUT.
///
/// Expects a full-screen quad supplying `vUv` and the frame bound to
/// `uFrame`. LUT textures are RGBA float 3D textures as produced by
/// [`lut_texture_data`] with linear filtering.
pub fn fragment_shader() -> String {
    format!(
        r#"#version 300 es
precision highp float;
precision highp sampler3D;

in vec2 vUv;
out vec4 fragColor;

uniform sampler2D uFrame;

uniform float exposure;
uniform float contrast;
uniform float saturation;
uniform float vibrance;
uniform float temperature;
uniform float tint;
uniform float highlights;
uniform float shadows;

uniform sampler3D uTechnicalLut;
uniform float uTechnicalSize;
uniform float uTechnicalIntensity;
uniform bool uTechnicalEnabled;

uniform sampler3D uCreativeLut;
uniform float uCreativeSize;
uniform float uCreativeIntensity;
uniform bool uCreativeEnabled;

float luminance(vec3 color) {{
  return dot(color, vec3({luma_r}, {luma_g}, {luma_b}));
}}

vec3 applyLut(sampler3D lut, float size, float intensity, vec3 color) {{
  vec3 coord = clamp(color, 0.0, 1.0) * ((size - 1.0) / size) + 0.5 / size;
  vec3 looked = clamp(texture(lut, coord).rgb, 0.0, 1.0);
  return mix(color, looked, intensity);
}}

vec3 applyExposure(vec3 color, float ev) {{
  return color * pow(2.0, ev * {exposure_sensitivity});
}}

vec3 applyContrast(vec3 color, float amount) {{
  return (color - 0.5) * (1.0 + amount / 100.0) + 0.5;
}}

vec3 applySaturation(vec3 color, float amount) {{
  float lum = luminance(color);
  return mix(vec3(lum), color, 1.0 + amount / 100.0);
}}

vec3 applyVibrance(vec3 color, float amount) {{
  float lum = luminance(color);
  float sat = length(color - vec3(lum));
  return mix(vec3(lum), color, 1.0 + amount / 100.0 * (1.0 - sat));
}}

vec3 applyTemperature(vec3 color, float amount) {{
  float shift = amount / 100.0;
  color.r += shift * {temperature_shift};
  color.b -= shift * {temperature_shift};
  return color;
}}

vec3 applyTint(vec3 color, float amount) {{
  float shift = amount / 100.0;
  color.g -= shift * {tint_green};
  color.r += shift * {tint_magenta};
  color.b += shift * {tint_magenta};
  return color;
}}

vec3 applyHighlights(vec3 color, float amount) {{
  float mask = smoothstep({hl_low}, {hl_high}, luminance(color));
  return color + mask * (amount / 100.0 * {hl_strength} * {hl_gain});
}}

vec3 applyShadows(vec3 color, float amount) {{
  float mask = 1.0 - smoothstep({sh_low}, {sh_high}, luminance(color));
  return color + mask * (amount / 100.0 * {sh_strength} * {sh_gain});
}}

void main() {{
  vec4 source = texture(uFrame, vUv);
  vec3 color = source.rgb;

  if (uTechnicalEnabled) {{
    color = applyLut(uTechnicalLut, uTechnicalSize, uTechnicalIntensity, color);
  }}

  color = applyExposure(color, exposure);
  color = applyContrast(color, contrast);
  color = applySaturation(color, saturation);
  color = applyVibrance(color, vibrance);
  color = applyTemperature(color, temperature);
  color = applyTint(color, tint);
  color = applyHighlights(color, highlights);
  color = applyShadows(color, shadows);
  color = clamp(color, 0.0, 1.0);

  if (uCreativeEnabled) {{
    color = applyLut(uCreativeLut, uCreativeSize, uCreativeIntensity, color);
  }}

  fragColor = vec4(color, source.a);
}}
"#,
        luma_r = lit(LUMA_R),
        luma_g = lit(LUMA_G),
        luma_b = lit(LUMA_B),
        exposure_sensitivity = lit(EXPOSURE_SENSITIVITY),
        temperature_shift = lit(TEMPERATURE_SHIFT),
        tint_green = lit(TINT_GREEN_SHIFT),
        tint_magenta = lit(TINT_MAGENTA_SHIFT),
        hl_low = lit(HIGHLIGHTS_MASK_LOW),
        hl_high = lit(HIGHLIGHTS_MASK_HIGH),
        hl_strength = lit(HIGHLIGHTS_STRENGTH),
        hl_gain = lit(HIGHLIGHTS_GAIN),
        sh_low = lit(SHADOWS_MASK_LOW),
        sh_high = lit(SHADOWS_MASK_HIGH),
        sh_strength = lit(SHADOWS_STRENGTH),
        sh_gain = lit(SHADOWS_GAIN),
    )
}

/// Texel data for uploading a table as an RGBA32F 3D texture.
///
/// Layout is width = R, height = G, depth = B, matching the cell order.
pub fn lut_texture_data(table: &LutTable) -> Vec<f32> {
    table.to_rgba_texels()
}

/// Uniform values for one LUT stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUniforms {
    pub enabled: bool,
    pub size: f32,
    /// Blend factor in `[0, 1]`.
    pub intensity: f32,
}

impl StageUniforms {
    fn from_stage(stage: &LutStage) -> Self {
        let (lo, hi) = INTENSITY_RANGE;
        match &stage.table {
            Some(table) if !stage.is_bypass() => Self {
                enabled: true,
                size: table.size() as f32,
                intensity: stage.intensity.clamp(lo, hi) / hi,
            },
            _ => Self {
                enabled: false,
                size: 0.0,
                intensity: 0.0,
            },
        }
    }
}

/// Every uniform the fragment shader reads, besides the textures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShaderUniforms {
    pub settings: ColorSettings,
    pub technical: StageUniforms,
    pub creative: StageUniforms,
}

/// Uniform values for a frame, with settings clamped to their ranges.
pub fn uniforms(settings: &ColorSettings, stack: &LutStack) -> ShaderUniforms {
    ShaderUniforms {
        settings: settings.clamped(),
        technical: StageUniforms::from_stage(&stack.technical),
        creative: StageUniforms::from_stage(&stack.creative),
    }
}

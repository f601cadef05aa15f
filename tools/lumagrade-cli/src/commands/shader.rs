//! Dump the preview shader.

use std::path::PathBuf;

use anyhow::Context;
use lumagrade_color::shader::{fragment_shader, uniforms};
use lumagrade_color::{ColorSettings, LutStack};

pub fn run(grade: Option<PathBuf>) -> anyhow::Result<()> {
    print!("{}", fragment_shader());

    if let Some(path) = grade {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: ColorSettings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid grade settings in {}", path.display()))?;
        let values = uniforms(&settings, &LutStack::default());
        println!();
        println!("// uniforms");
        for line in serde_json::to_string_pretty(&values)?.lines() {
            println!("// {line}");
        }
    }
    Ok(())
}

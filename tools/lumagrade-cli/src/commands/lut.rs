//! LUT inspection, derivation, and preset baking.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use lumagrade_color::{builtin_presets, preset, LutTable};
use lumagrade_common::config::AppConfig;

/// Resolve a LUT argument: a built-in preset id, a `.cube` path, or a file
/// name under the configured LUT directory.
pub fn load_lut(lut: &str, config: &AppConfig) -> anyhow::Result<Arc<LutTable>> {
    if let Some(p) = preset(lut) {
        return Ok(p.table.clone());
    }

    let direct = PathBuf::from(lut);
    let path = if direct.exists() {
        direct
    } else {
        match config.luts_dir.as_ref().map(|dir| dir.join(lut)) {
            Some(candidate) if candidate.exists() => candidate,
            _ => anyhow::bail!("'{lut}' is neither a preset id nor an existing .cube file"),
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let table = LutTable::parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::debug!(path = %path.display(), size = table.size(), "LUT loaded");
    Ok(Arc::new(table))
}

fn write_cube(table: &LutTable, output: Option<PathBuf>) -> anyhow::Result<()> {
    let text = table.to_cube_string();
    match output {
        Some(path) => {
            write_file(&path, &text)?;
            println!("Wrote {} ({}^3)", path.display(), table.size());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn write_file(path: &Path, text: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn inspect(lut: &str, config: &AppConfig) -> anyhow::Result<()> {
    let table = load_lut(lut, config)?;

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for c in table.cells() {
        for (i, v) in [c.r, c.g, c.b].into_iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    let identity = LutTable::identity(table.size());
    let deviation = table
        .cells()
        .iter()
        .zip(identity.cells())
        .map(|(a, b)| a.max_abs_diff(*b))
        .fold(0.0f32, f32::max);

    println!("LUT: {lut}");
    println!("  Title: {}", table.title().unwrap_or("(none)"));
    println!("  Size: {0}x{0}x{0} ({1} cells)", table.size(), table.cells().len());
    println!("  Red range:   {:.4} .. {:.4}", min[0], max[0]);
    println!("  Green range: {:.4} .. {:.4}", min[1], max[1]);
    println!("  Blue range:  {:.4} .. {:.4}", min[2], max[2]);
    println!("  Max deviation from identity: {deviation:.4}");
    Ok(())
}

pub fn derive(
    lut: &str,
    contrast: f32,
    title: Option<String>,
    output: Option<PathBuf>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    if !contrast.is_finite() || contrast < 0.0 {
        anyhow::bail!("contrast factor must be a non-negative number, got {contrast}");
    }
    let table = load_lut(lut, config)?;
    let mut derived = table.with_contrast(contrast);
    let title = title.or_else(|| {
        table
            .title()
            .map(|t| format!("{t} (contrast {contrast})"))
    });
    if let Some(title) = title {
        derived = derived.with_title(title);
    }
    write_cube(&derived, output)
}

pub fn bake(id: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(p) = preset(id) else {
        anyhow::bail!("Unknown preset '{id}'. Run `lumagrade lut presets` for the list.");
    };
    write_cube(&p.table, output)
}

pub fn presets() -> anyhow::Result<()> {
    println!("{:<26} {:<10} NAME", "ID", "KIND");
    for p in builtin_presets() {
        println!("{:<26} {:<10} {}", p.id, p.kind.to_string(), p.name);
    }
    Ok(())
}

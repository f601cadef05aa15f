//! Grade, optionally upscale, and encode a video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use lumagrade_color::{ColorSettings, LutStack, LutStage};
use lumagrade_common::config::AppConfig;
use lumagrade_render_engine::{
    estimate_export_time_secs, EncoderKind, ExportController, ExportIo, ExportOutcome,
    ExportQuality, ExportRequest, ExportStatus, FfmpegDecoder, FileSink, FrameStrategy,
    MediaDecoder,
};
use lumagrade_upscale::{is_builtin_locator, BuiltinLoader, SuperResolutionModel};

use super::lut::load_lut;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Source video
    pub input: PathBuf,

    /// Output file path (defaults to <input>-graded.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Quality preset: low|medium|high|custom
    #[arg(long)]
    pub quality: Option<String>,

    /// Bitrate in bits per second (custom quality)
    #[arg(long)]
    pub bitrate: Option<u64>,

    /// Output frame rate: 24|25|30|60
    #[arg(long)]
    pub fps: Option<u32>,

    /// Frame strategy: realtime|deterministic (default depends on --upscale)
    #[arg(long)]
    pub strategy: Option<String>,

    /// Codec: h264|y4m
    #[arg(long)]
    pub codec: Option<String>,

    /// Upscale every frame 2x
    #[arg(long)]
    pub upscale: bool,

    /// Super-resolution model locator (builtin:catmull-rom, builtin:lanczos3, builtin:bilinear)
    #[arg(long, default_value = lumagrade_upscale::DEFAULT_MODEL)]
    pub model: String,

    /// Technical LUT: preset id or .cube path
    #[arg(long)]
    pub technical: Option<String>,

    /// Technical LUT intensity [0, 100]
    #[arg(long, default_value = "100")]
    pub technical_intensity: f32,

    /// Creative LUT: preset id or .cube path
    #[arg(long)]
    pub creative: Option<String>,

    /// Creative LUT intensity [0, 100]
    #[arg(long, default_value = "100")]
    pub creative_intensity: f32,

    /// Grade settings as a JSON file; individual flags override it
    #[arg(long)]
    pub grade: Option<PathBuf>,

    /// Exposure in stops [-2, 2]
    #[arg(long, allow_hyphen_values = true)]
    pub exposure: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub contrast: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub saturation: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub vibrance: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub temperature: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub tint: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub highlights: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pub shadows: Option<f32>,
}

impl ExportArgs {
    /// Grade settings from `--grade`, overridden by individual flags.
    fn color_settings(&self) -> anyhow::Result<ColorSettings> {
        let mut settings = match &self.grade {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid grade settings in {}", path.display()))?
            }
            None => ColorSettings::default(),
        };

        let overrides = [
            (self.exposure, &mut settings.exposure),
            (self.contrast, &mut settings.contrast),
            (self.saturation, &mut settings.saturation),
            (self.vibrance, &mut settings.vibrance),
            (self.temperature, &mut settings.temperature),
            (self.tint, &mut settings.tint),
            (self.highlights, &mut settings.highlights),
            (self.shadows, &mut settings.shadows),
        ];
        for (value, field) in overrides {
            if let Some(v) = value {
                *field = v;
            }
        }
        Ok(settings)
    }

    fn lut_stack(&self, config: &AppConfig) -> anyhow::Result<LutStack> {
        let stage = |lut: &Option<String>, intensity: f32| -> anyhow::Result<LutStage> {
            Ok(match lut {
                Some(lut) => LutStage::new(load_lut(lut, config)?, intensity),
                None => LutStage::bypass(),
            })
        };
        Ok(LutStack::new(
            stage(&self.technical, self.technical_intensity)?,
            stage(&self.creative, self.creative_intensity)?,
        ))
    }

    fn request(&self, config: &AppConfig) -> anyhow::Result<ExportRequest> {
        let defaults = &config.export;
        let quality: ExportQuality = self
            .quality
            .as_deref()
            .unwrap_or(defaults.quality.as_str())
            .parse()?;
        let strategy = match self.strategy.as_deref().unwrap_or(defaults.strategy.as_str()) {
            "auto" => None,
            other => Some(other.parse::<FrameStrategy>()?),
        };
        let codec: EncoderKind = self.codec.as_deref().unwrap_or(defaults.codec.as_str()).parse()?;

        Ok(ExportRequest {
            quality: if self.bitrate.is_some() {
                ExportQuality::Custom
            } else {
                quality
            },
            explicit_bitrate: self.bitrate,
            fps: self.fps.unwrap_or(defaults.fps),
            upscale_enabled: self.upscale,
            strategy,
            codec,
            color_settings: self.color_settings()?,
            lut_stack: self.lut_stack(config)?,
        })
    }
}

pub async fn run(args: ExportArgs, config: &AppConfig) -> anyhow::Result<()> {
    let request = args.request(config)?;

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        let ext = match request.codec {
            EncoderKind::H264 => "mp4",
            EncoderKind::Y4m => "y4m",
        };
        args.input.with_file_name(format!("{stem}-graded.{ext}"))
    });

    let mut decoder = FfmpegDecoder::open(&args.input)
        .map_err(|e| anyhow::anyhow!("Failed to open source: {e}"))?;
    let info = decoder.info().await?;

    println!("Exporting: {}", args.input.display());
    println!("  Output: {}", output.display());
    println!(
        "  Source: {}x{} @ {:.2} fps, {:.1}s",
        info.width, info.height, info.frame_rate, info.duration_secs
    );
    println!(
        "  Codec: {}  Quality: {}  FPS: {}  Upscale: {}",
        request.codec, request.quality, request.fps, request.upscale_enabled
    );
    println!(
        "  Estimated time: ~{}s",
        estimate_export_time_secs(info.duration_secs)
    );

    if request.upscale_enabled && is_builtin_locator(&args.model) {
        println!(
            "  Warning: {} is an interpolating upscaler, not a neural model; \
             no neural runtime is bundled",
            args.model
        );
    }
    let upscaler = request
        .upscale_enabled
        .then(|| SuperResolutionModel::new(args.model.clone(), Arc::new(BuiltinLoader)));

    let controller = ExportController::new((&config.export).into());

    let cancel = controller.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n  Cancelling...");
            cancel.cancel();
        }
    });

    let mut progress = controller.subscribe();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let p = progress.borrow_and_update().clone();
            if p.status == ExportStatus::Encoding {
                print!(
                    "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                    p.fraction() * 100.0,
                    p.current_frame,
                    p.total_frames,
                    p.estimated_seconds_remaining,
                );
                let _ = std::io::stdout().flush();
            }
        }
    });

    let mut sink = FileSink::new(&output);
    let result = controller
        .export(
            &request,
            ExportIo {
                decoder: &mut decoder,
                pipeline: request.codec.pipeline(),
                upscaler,
                sink: &mut sink,
            },
        )
        .await;

    ctrl_c.abort();
    printer.abort();

    match result {
        Ok(ExportOutcome::Complete {
            frames,
            bytes,
            fallback_frames,
        }) => {
            println!("\nExport complete: {}", output.display());
            println!("  {frames} frames, {:.1} MB", bytes as f64 / 1_048_576.0);
            if fallback_frames > 0 {
                println!("  {fallback_frames} frames were resized without the model");
            }
        }
        Ok(ExportOutcome::Cancelled { frames }) => {
            println!("\nExport cancelled after {frames} frames");
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

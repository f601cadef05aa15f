//! Lumagrade CLI: color grade, upscale, and export video from the terminal.
//!
//! Usage:
//!   lumagrade export <INPUT>        Grade and encode a video
//!   lumagrade lut inspect <PATH>    Show a .cube file's properties
//!   lumagrade lut derive <LUT>      Write a contrast-adjusted copy of a LUT
//!   lumagrade lut bake <PRESET>     Write a built-in preset as .cube
//!   lumagrade lut presets           List built-in presets
//!   lumagrade shader                Print the preview fragment shader
//!   lumagrade check                 Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lumagrade_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "lumagrade",
    about = "Color grading, LUTs, and upscaled video export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade, optionally upscale, and encode a video
    Export(commands::export::ExportArgs),

    /// Inspect, derive, and bake 3D LUTs
    Lut {
        #[command(subcommand)]
        command: LutCommands,
    },

    /// Print the GLSL fragment shader used for live preview
    Shader {
        /// Also print the uniform values for these grade settings (JSON file)
        #[arg(long)]
        grade: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,
}

#[derive(Subcommand)]
enum LutCommands {
    /// Show size, title, and output range of a LUT
    Inspect {
        /// Preset id or .cube path
        lut: String,
    },

    /// Write a contrast-adjusted copy of a LUT
    Derive {
        /// Preset id or .cube path
        lut: String,

        /// Contrast factor applied around mid-gray
        #[arg(long)]
        contrast: f32,

        /// Title of the derived table
        #[arg(long)]
        title: Option<String>,

        /// Output .cube path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a built-in preset as a .cube file
    Bake {
        /// Preset id
        preset: String,

        /// Output .cube path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List built-in presets
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    lumagrade_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export(args) => commands::export::run(args, &config).await,
        Commands::Lut { command } => match command {
            LutCommands::Inspect { lut } => commands::lut::inspect(&lut, &config),
            LutCommands::Derive {
                lut,
                contrast,
                title,
                output,
            } => commands::lut::derive(&lut, contrast, title, output, &config),
            LutCommands::Bake { preset, output } => commands::lut::bake(&preset, output),
            LutCommands::Presets => commands::lut::presets(),
        },
        Commands::Shader { grade } => commands::shader::run(grade),
        Commands::Check => commands::check::run().await,
    }
}

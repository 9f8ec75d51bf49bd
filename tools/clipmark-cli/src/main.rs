//! Clipmark CLI — Command-line interface for the media export pipeline.
//!
//! Usage:
//!   clipmark export <PATH> [OPTIONS]   Export a video with enhancements
//!   clipmark probe <PATH>              Show source metadata
//!   clipmark check                     Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "clipmark",
    about = "Video enhancement and export: watermark, text overlay, filters",
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
    /// Export a video with enhancements applied
    Export {
        /// Path to the source video
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable the brand watermark
        #[arg(long)]
        no_watermark: bool,

        /// Watermark anchor: top-left, top-right, bottom-left, bottom-right, center
        #[arg(long, default_value = "bottom-right")]
        watermark_position: String,

        /// Text overlay; empty disables the overlay
        #[arg(long, default_value = "")]
        text: String,

        /// Text overlay anchor: top-left, top-center, top-right,
        /// bottom-left, bottom-center, bottom-right
        #[arg(long, default_value = "bottom-center")]
        text_position: String,

        /// Text overlay size in pixels [12, 72]
        #[arg(long, default_value = "24")]
        text_size: u32,

        /// Text overlay color as RRGGBB hex
        #[arg(long, default_value = "ffffff")]
        text_color: String,

        /// Brightness percentage [0, 200], 100 = unchanged
        #[arg(long, default_value = "100")]
        brightness: u32,

        /// Contrast percentage [0, 200], 100 = unchanged
        #[arg(long, default_value = "100")]
        contrast: u32,

        /// Saturation percentage [0, 200], 100 = unchanged
        #[arg(long, default_value = "100")]
        saturation: u32,

        /// Override the compositing frame rate
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Show metadata for a source video
    Probe {
        /// Path to the source video
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    clipmark_common::logging::init_cli_logging(cli.verbose);

    match cli.command {
        Commands::Export {
            path,
            output,
            no_watermark,
            watermark_position,
            text,
            text_position,
            text_size,
            text_color,
            brightness,
            contrast,
            saturation,
            fps,
        } => {
            commands::export::run(commands::export::ExportArgs {
                path,
                output,
                watermark: !no_watermark,
                watermark_position,
                text,
                text_position,
                text_size,
                text_color,
                brightness,
                contrast,
                saturation,
                fps,
            })
            .await
        }
        Commands::Probe { path } => commands::probe::run(path),
        Commands::Check => commands::check::run(),
    }
}

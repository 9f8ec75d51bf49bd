//! Export a video with enhancements applied.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clipmark_common::config::AppConfig;
use clipmark_export_engine::{
    ExportOrchestrator, FfmpegCapabilityProbe, FfmpegEncoderSink, FfmpegFrameSource, FrameSource,
};
use clipmark_media_model::{
    EnhancementConfig, FilterSettings, OverlayPosition, RgbColor, WatermarkPosition,
};

pub struct ExportArgs {
    pub path: PathBuf,
    pub output: Option<PathBuf>,
    pub watermark: bool,
    pub watermark_position: String,
    pub text: String,
    pub text_position: String,
    pub text_size: u32,
    pub text_color: String,
    pub brightness: u32,
    pub contrast: u32,
    pub saturation: u32,
    pub fps: Option<u32>,
}

pub async fn run(args: ExportArgs) -> anyhow::Result<()> {
    println!("Exporting: {}", args.path.display());

    let mut app_config = AppConfig::load();
    if let Some(fps) = args.fps {
        app_config.export.fps = fps;
    }

    let config = enhancement_from_args(&args)?;
    let output_path = args.output.unwrap_or_else(|| {
        args.path
            .with_extension(format!("clipmark.{}", app_config.export.delivery_container))
    });

    let mut source = FfmpegFrameSource::open(&args.path, app_config.export.fps)
        .map_err(|e| anyhow::anyhow!("Failed to open source: {e}"))?;
    let info = source.info();
    if let Some((w, h)) = info.dimensions {
        println!("  Source: {w}x{h}");
    }
    if info.has_audio {
        println!("  Audio: passthrough");
    }

    let mut sink = FfmpegEncoderSink::new();
    if info.has_audio {
        sink = sink.with_audio_file(source.path());
    }

    let probe = FfmpegCapabilityProbe::detect();
    let orchestrator = ExportOrchestrator::new(app_config.export, Arc::new(probe));

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrlc_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling export...");
            ctrlc_flag.store(true, Ordering::SeqCst);
        }
    });

    match orchestrator
        .export(&mut source, &mut sink, &config, cancel)
        .await
    {
        Ok(artifact) => {
            std::fs::write(&output_path, &artifact.bytes)?;
            println!(
                "Export complete: {} ({} bytes, {})",
                output_path.display(),
                artifact.size_bytes,
                artifact.mime_type
            );
            Ok(())
        }
        Err(failure) => Err(anyhow::anyhow!("{failure}")),
    }
}

fn enhancement_from_args(args: &ExportArgs) -> anyhow::Result<EnhancementConfig> {
    let watermark_position = parse_watermark_position(&args.watermark_position)?;
    let text_position = parse_overlay_position(&args.text_position)?;
    let text_color = RgbColor::parse_hex(&args.text_color)
        .ok_or_else(|| anyhow::anyhow!("Invalid color: {}. Use RRGGBB hex", args.text_color))?;

    Ok(EnhancementConfig {
        watermark_enabled: args.watermark,
        watermark_position,
        text_overlay: args.text.clone(),
        text_position,
        text_color,
        text_size_px: args.text_size,
        filters: FilterSettings {
            brightness: args.brightness,
            contrast: args.contrast,
            saturation: args.saturation,
        },
        ..Default::default()
    })
}

fn parse_watermark_position(s: &str) -> anyhow::Result<WatermarkPosition> {
    match s {
        "top-left" => Ok(WatermarkPosition::TopLeft),
        "top-right" => Ok(WatermarkPosition::TopRight),
        "bottom-left" => Ok(WatermarkPosition::BottomLeft),
        "bottom-right" => Ok(WatermarkPosition::BottomRight),
        "center" => Ok(WatermarkPosition::Center),
        _ => Err(anyhow::anyhow!(
            "Unknown watermark position: {s}. Use: top-left, top-right, bottom-left, bottom-right, center"
        )),
    }
}

fn parse_overlay_position(s: &str) -> anyhow::Result<OverlayPosition> {
    match s {
        "top-left" => Ok(OverlayPosition::TopLeft),
        "top-center" => Ok(OverlayPosition::TopCenter),
        "top-right" => Ok(OverlayPosition::TopRight),
        "bottom-left" => Ok(OverlayPosition::BottomLeft),
        "bottom-center" => Ok(OverlayPosition::BottomCenter),
        "bottom-right" => Ok(OverlayPosition::BottomRight),
        _ => Err(anyhow::anyhow!(
            "Unknown text position: {s}. Use: top-left, top-center, top-right, bottom-left, bottom-center, bottom-right"
        )),
    }
}

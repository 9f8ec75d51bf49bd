//! Show metadata for a source video.

use std::path::PathBuf;

use clipmark_common::config::AppConfig;
use clipmark_export_engine::{negotiate, FfmpegCapabilityProbe, FfmpegFrameSource, FrameSource};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let app_config = AppConfig::load();
    let source = FfmpegFrameSource::open(&path, app_config.export.fps)
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", path.display()))?;
    let info = source.info();

    println!("Source: {}", path.display());
    match info.dimensions {
        Some((w, h)) => println!("  Dimensions: {w}x{h}"),
        None => println!("  Dimensions: unknown"),
    }
    match info.duration_secs {
        Some(secs) => println!("  Duration: {secs:.2}s"),
        None => println!("  Duration: unknown"),
    }
    println!("  Audio: {}", if info.has_audio { "yes" } else { "no" });
    println!("  Ready: {}", if info.is_ready() { "yes" } else { "no" });

    let probe = FfmpegCapabilityProbe::detect();
    match negotiate(&probe, info.has_audio) {
        Ok(choice) => {
            println!(
                "  Recording format: {}/{} ({})",
                choice.container, choice.video_codec, choice.mime_type
            );
        }
        Err(e) => println!("  Recording format: unavailable ({e})"),
    }

    Ok(())
}

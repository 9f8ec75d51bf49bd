//! Check system capabilities.

use clipmark_export_engine::{negotiate, FfmpegCapabilityProbe, FfmpegTranscoder, TranscodeBackend};

pub fn run() -> anyhow::Result<()> {
    println!("Clipmark System Check");
    println!("{}", "=".repeat(50));

    let transcoder = FfmpegTranscoder::new();
    if transcoder.is_available() {
        println!("[OK] ffmpeg found");
    } else {
        println!("[FAIL] ffmpeg not found in PATH");
    }

    let probe = FfmpegCapabilityProbe::detect();
    for has_audio in [true, false] {
        let label = if has_audio { "with audio" } else { "video only" };
        match negotiate(&probe, has_audio) {
            Ok(choice) => {
                println!(
                    "[OK] Recording format ({label}): {}/{}{}",
                    choice.container,
                    choice.video_codec,
                    choice
                        .audio_codec
                        .as_deref()
                        .map(|a| format!("+{a}"))
                        .unwrap_or_default()
                );
            }
            Err(e) => println!("[FAIL] Recording format ({label}): {e}"),
        }
    }

    println!();
    if transcoder.is_available() {
        println!("Clipmark is ready.");
    } else {
        println!("Install ffmpeg to enable export.");
    }

    Ok(())
}

//! Software transcoder: intermediate stream to delivery format.
//!
//! Only invoked when negotiation fell back to a non-delivery format. The
//! conversion policy is deterministic (constant quality factor, fixed
//! preset, normalized pixel format), so re-running the same input yields
//! a functionally equivalent artifact: same duration, resolution, and
//! codecs.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use clipmark_common::config::ExportDefaults;
use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_media_model::{IntermediateStream, OutputArtifact};

/// Target format and bounds for one transcode run.
#[derive(Debug, Clone)]
pub struct TranscodeParams {
    /// Delivery container.
    pub container: String,

    /// Delivery video codec.
    pub video_codec: String,

    /// MIME type the artifact is tagged with.
    pub mime_type: String,

    /// Largest input the in-process transcoder accepts.
    pub size_limit_bytes: u64,

    /// Hard bound on one run.
    pub timeout: Duration,
}

impl TranscodeParams {
    pub fn from_defaults(defaults: &ExportDefaults) -> Self {
        Self {
            container: defaults.delivery_container.clone(),
            video_codec: defaults.delivery_video_codec.clone(),
            mime_type: format!("video/{}", defaults.delivery_container),
            size_limit_bytes: defaults.transcode_size_limit_bytes,
            timeout: Duration::from_secs_f64(defaults.transcode_timeout_secs),
        }
    }
}

/// A transcoding engine implementation.
pub trait TranscodeBackend: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Whether this backend can run on the current system.
    fn is_available(&self) -> bool;

    /// Convert the input stream to the delivery format.
    fn transcode(
        &self,
        input: &IntermediateStream,
        params: &TranscodeParams,
    ) -> PipelineResult<OutputArtifact>;
}

/// Run one transcode with the size guard applied.
///
/// The size check happens before the backend is touched; an oversized
/// input is reported, never attempted or truncated.
pub fn transcode(
    backend: &dyn TranscodeBackend,
    input: &IntermediateStream,
    params: &TranscodeParams,
) -> PipelineResult<OutputArtifact> {
    if input.size_bytes() > params.size_limit_bytes {
        return Err(PipelineError::TooLargeForInlineTranscode {
            size_bytes: input.size_bytes(),
            limit_bytes: params.size_limit_bytes,
        });
    }
    if input.is_empty() {
        return Err(PipelineError::input_unreadable("empty intermediate stream"));
    }

    tracing::info!(
        backend = backend.name(),
        input_bytes = input.size_bytes(),
        from = %input.mime_type,
        to = %params.mime_type,
        "Transcoding intermediate stream"
    );
    backend.transcode(input, params)
}

/// ffmpeg-based transcoder.
///
/// Policy: `-crf 23 -preset veryfast -pix_fmt yuv420p`, audio re-encoded
/// to AAC at a fixed bitrate, and the container index moved to the front
/// (`-movflags +faststart`) so the artifact streams without a full
/// download.
pub struct FfmpegTranscoder;

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self
    }

    fn video_encoder(codec: &str) -> &'static str {
        match codec {
            "h264" => "libx264",
            "vp9" => "libvpx-vp9",
            "vp8" => "libvpx",
            _ => "libx264",
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeBackend for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .is_ok_and(|ok| ok)
    }

    fn transcode(
        &self,
        input: &IntermediateStream,
        params: &TranscodeParams,
    ) -> PipelineResult<OutputArtifact> {
        let workdir = TempWorkdir::create()?;
        let input_path = workdir.path("intermediate.bin");
        let output_path = workdir.path(&format!("artifact.{}", params.container));
        std::fs::write(&input_path, &input.bytes)?;

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(&input_path)
            .args(["-c:v", Self::video_encoder(&params.video_codec)])
            .args(["-crf", "23", "-preset", "veryfast"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-c:a", "aac", "-b:a", "128k"])
            .args(["-movflags", "+faststart"])
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::encoder_init("ffmpeg not found in PATH")
                } else {
                    PipelineError::encoder_init(format!("failed to spawn ffmpeg: {e}"))
                }
            })?;

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if started.elapsed() >= params.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(PipelineError::timeout(
                            "transcode exceeded its hard bound",
                            started.elapsed().as_secs_f64(),
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    let _ = child.kill();
                    return Err(PipelineError::encoder(format!(
                        "failed to wait for ffmpeg: {e}"
                    )));
                }
            }
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.lines().last().unwrap_or("no diagnostic").to_string();
            return Err(PipelineError::input_unreadable(format!(
                "ffmpeg rejected intermediate stream: {detail}"
            )));
        }

        let bytes = std::fs::read(&output_path)?;
        if bytes.is_empty() {
            return Err(PipelineError::encoder("transcode produced zero bytes"));
        }

        tracing::info!(
            output_bytes = bytes.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Transcode complete"
        );
        Ok(OutputArtifact::new(bytes, params.mime_type.clone()))
    }
}

/// Scratch directory removed on drop, success or failure.
struct TempWorkdir {
    root: PathBuf,
}

impl TempWorkdir {
    fn create() -> PipelineResult<Self> {
        let root = std::env::temp_dir().join(format!(
            "clipmark-transcode-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Drop for TempWorkdir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

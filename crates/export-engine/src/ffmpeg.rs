//! ffmpeg-backed implementations of the source and encoder seams.
//!
//! Both sides ride child processes over pipes: the frame source decodes
//! a file to raw RGBA frames on its stdout, the encoder sink feeds raw
//! RGBA frames into an encoder's stdin and collects the muxed container
//! bytes from its stdout. Nothing here buffers more than one frame plus
//! the chunk queue.

use std::collections::HashSet;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_enhance_core::RawFrame;
use clipmark_media_model::{AudioPacket, EncodedChunk, SourceInfo};

use crate::codec::{CapabilityProbe, CodecCandidate, CodecChoice};
use crate::encoder::EncoderSink;
use crate::source::{FramePull, FrameSource};

const CHUNK_READ_BYTES: usize = 64 * 1024;

fn encoder_name(video_codec: &str) -> &'static str {
    match video_codec {
        "h264" => "libx264",
        "vp9" => "libvpx-vp9",
        "vp8" => "libvpx",
        _ => "libx264",
    }
}

fn audio_encoder_name(audio_codec: &str) -> &'static str {
    match audio_codec {
        "aac" => "aac",
        "opus" => "libopus",
        _ => "aac",
    }
}

/// Muxer for streaming output over a pipe. The wildcard choice carries
/// an empty container name and lands on matroska, which muxes anything.
fn muxer_name(container: &str) -> &'static str {
    match container {
        "mp4" => "mp4",
        "webm" => "webm",
        _ => "matroska",
    }
}

fn probe_field(path: &Path, stream: &str, entry: &str) -> PipelineResult<String> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", stream])
        .args(["-show_entries", entry])
        .args(["-of", "csv=p=0"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::encoder_init("ffprobe not found in PATH")
            } else {
                PipelineError::encoder_init(format!("failed to spawn ffprobe: {e}"))
            }
        })?;
    if !output.status.success() {
        return Err(PipelineError::input_unreadable(format!(
            "ffprobe failed on {}",
            path.display()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Frame source decoding a video file through ffmpeg.
///
/// Metadata comes from ffprobe up front; the decode process is spawned
/// lazily on the first frame pull so constructing a source stays cheap.
pub struct FfmpegFrameSource {
    path: PathBuf,
    id: String,
    info: SourceInfo,
    fps: u32,
    frame_bytes: usize,
    decoder: Option<Child>,
    stdout: Option<BufReader<std::process::ChildStdout>>,
}

impl FfmpegFrameSource {
    pub fn open(path: impl AsRef<Path>, fps: u32) -> PipelineResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(PipelineError::input_unreadable(format!(
                "no such file: {}",
                path.display()
            )));
        }

        let dims = probe_field(&path, "v:0", "stream=width,height")?;
        let (width, height) = parse_dimensions(&dims).ok_or_else(|| {
            PipelineError::input_unreadable(format!(
                "no decodable video stream in {}",
                path.display()
            ))
        })?;
        let duration_secs = probe_field(&path, "v:0", "format=duration")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);
        let has_audio = probe_field(&path, "a", "stream=index")
            .map(|s| !s.is_empty())
            .unwrap_or(false);

        let id = path.to_string_lossy().to_string();
        Ok(Self {
            path,
            id,
            info: SourceInfo {
                dimensions: Some((width, height)),
                duration_secs,
                has_audio,
            },
            fps,
            frame_bytes: width as usize * height as usize * 4,
            decoder: None,
            stdout: None,
        })
    }

    /// Path to the original file, for direct audio-track mapping.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn spawn_decoder(&mut self) -> PipelineResult<()> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error"])
            .arg("-i")
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-vf", &format!("fps={}", self.fps)])
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::encoder_init("ffmpeg not found in PATH")
                } else {
                    PipelineError::encoder_init(format!("failed to spawn decoder: {e}"))
                }
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            PipelineError::encoder_init("decoder spawned without a stdout pipe")
        })?;
        self.stdout = Some(BufReader::new(stdout));
        self.decoder = Some(child);
        Ok(())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> SourceInfo {
        self.info.clone()
    }

    fn next_frame(&mut self) -> PipelineResult<FramePull> {
        if self.stdout.is_none() {
            self.spawn_decoder()?;
        }
        let reader = self
            .stdout
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("decoder stdout vanished"))?;

        let mut buf = vec![0u8; self.frame_bytes];
        match reader.read_exact(&mut buf) {
            Ok(()) => {
                let (width, height) = self.info.dimensions.unwrap_or((0, 0));
                let frame = RawFrame::from_rgba(width, height, buf).ok_or_else(|| {
                    PipelineError::input_unreadable("decoded frame has wrong byte length")
                })?;
                Ok(FramePull::Frame(frame))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(FramePull::EndOfInput),
            Err(e) => Err(PipelineError::input_unreadable(format!(
                "decoder pipe read failed: {e}"
            ))),
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.decoder.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn parse_dimensions(csv: &str) -> Option<(u32, u32)> {
    let mut parts = csv.split(',');
    let width = parts.next()?.trim().parse().ok()?;
    let height = parts.next()?.trim().parse().ok()?;
    Some((width, height))
}

/// Encoder sink feeding raw RGBA frames into an ffmpeg child.
///
/// Container bytes stream back on the child's stdout and are queued as
/// chunks by a reader thread, so a slow encoder never blocks the frame
/// loop on output backpressure.
pub struct FfmpegEncoderSink {
    audio_file: Option<PathBuf>,
    encoder: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<()>>,
    chunks: Arc<Mutex<Vec<EncodedChunk>>>,
    dropped_audio: u64,
}

impl FfmpegEncoderSink {
    pub fn new() -> Self {
        Self {
            audio_file: None,
            encoder: None,
            stdin: None,
            reader: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            dropped_audio: 0,
        }
    }

    /// Mux the audio track straight from the original file instead of
    /// packet-by-packet. Packets handed to `write_audio` are then
    /// acknowledged but not re-sent.
    pub fn with_audio_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_file = Some(path.into());
        self
    }

    /// Number of audio packets discarded because no audio mapping was
    /// configured for this sink.
    pub fn dropped_audio_packets(&self) -> u64 {
        self.dropped_audio
    }

    fn teardown(&mut self, kill: bool) -> Option<std::process::ExitStatus> {
        self.stdin.take();
        let status = self.encoder.take().map(|mut child| {
            if kill {
                let _ = child.kill();
            }
            child.wait()
        });
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        status.and_then(|s| s.ok())
    }
}

impl Default for FfmpegEncoderSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderSink for FfmpegEncoderSink {
    fn begin(
        &mut self,
        codec: &CodecChoice,
        width: u32,
        height: u32,
        fps: u32,
    ) -> PipelineResult<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &fps.to_string()])
            .args(["-i", "pipe:0"]);

        let mux_audio = codec.audio_codec.is_some() && self.audio_file.is_some();
        if mux_audio {
            if let Some(audio) = &self.audio_file {
                cmd.arg("-i").arg(audio);
            }
            cmd.args(["-map", "0:v", "-map", "1:a?"]);
        }

        cmd.args(["-c:v", encoder_name(&codec.video_codec)])
            .args(["-pix_fmt", "yuv420p"]);
        if let Some(audio_codec) = codec.audio_codec.as_deref() {
            if mux_audio {
                cmd.args(["-c:a", audio_encoder_name(audio_codec)]);
            }
        }

        let muxer = muxer_name(&codec.container);
        if muxer == "mp4" {
            // mp4 cannot seek back over a pipe; fragmented output keeps
            // the stream valid without a rewrite pass.
            cmd.args(["-movflags", "frag_keyframe+empty_moov"]);
        }
        cmd.args(["-f", muxer]).arg("pipe:1");

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::encoder_init("ffmpeg not found in PATH")
                } else {
                    PipelineError::encoder_init(format!("failed to spawn encoder: {e}"))
                }
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            PipelineError::encoder_init("encoder spawned without a stdin pipe")
        })?;
        let mut stdout = child.stdout.take().ok_or_else(|| {
            PipelineError::encoder_init("encoder spawned without a stdout pipe")
        })?;

        let chunks = Arc::clone(&self.chunks);
        let reader = std::thread::spawn(move || {
            let mut sequence = 0u64;
            let mut buf = vec![0u8; CHUNK_READ_BYTES];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut queue = match chunks.lock() {
                            Ok(queue) => queue,
                            Err(_) => break,
                        };
                        queue.push(EncodedChunk {
                            data: buf[..n].to_vec(),
                            sequence,
                        });
                        sequence += 1;
                    }
                }
            }
        });

        tracing::debug!(
            container = %codec.container,
            video_codec = %codec.video_codec,
            mux_audio,
            width,
            height,
            fps,
            "Encoder started"
        );
        self.stdin = Some(stdin);
        self.encoder = Some(child);
        self.reader = Some(reader);
        Ok(())
    }

    fn write_frame(&mut self, frame: &RawFrame, _pts_ns: u64) -> PipelineResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PipelineError::encoder("write_frame before begin"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| PipelineError::encoder(format!("encoder pipe write failed: {e}")))
    }

    fn write_audio(&mut self, _packet: AudioPacket) -> PipelineResult<()> {
        // Audio reaches the container through the direct file mapping
        // set up in begin; without one, per-packet delivery has nowhere
        // to go.
        if self.audio_file.is_none() {
            if self.dropped_audio == 0 {
                tracing::warn!(
                    "audio packets discarded: sink has no audio mapping; \
                     use with_audio_file to mux the original track"
                );
            }
            self.dropped_audio += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<Vec<EncodedChunk>> {
        let status = self.teardown(false);
        match status {
            Some(status) if status.success() => {
                let chunks = std::mem::take(
                    &mut *self
                        .chunks
                        .lock()
                        .map_err(|_| PipelineError::encoder("chunk queue poisoned"))?,
                );
                Ok(chunks)
            }
            Some(status) => Err(PipelineError::encoder(format!(
                "encoder exited with {status}"
            ))),
            None => Err(PipelineError::encoder("finish before begin")),
        }
    }

    fn abort(&mut self) {
        self.teardown(true);
        if let Ok(mut queue) = self.chunks.lock() {
            queue.clear();
        }
    }
}

impl Drop for FfmpegEncoderSink {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            self.abort();
        }
    }
}

/// Capability probe backed by the installed ffmpeg's encoder list.
///
/// The list is read once at construction; a missing ffmpeg yields an
/// empty set and every candidate, the wildcard included, probes false.
pub struct FfmpegCapabilityProbe {
    encoders: HashSet<String>,
}

impl FfmpegCapabilityProbe {
    pub fn detect() -> Self {
        let listing = Command::new("ffmpeg")
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).to_string())
            .unwrap_or_default();
        Self {
            encoders: parse_encoder_listing(&listing),
        }
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }
}

impl CapabilityProbe for FfmpegCapabilityProbe {
    fn probe(&self, candidate: &CodecCandidate) -> bool {
        if candidate.is_wildcard() {
            return !self.encoders.is_empty();
        }
        if !self.has_encoder(encoder_name(candidate.video_codec)) {
            return false;
        }
        match candidate.audio_codec {
            Some(audio) => self.has_encoder(audio_encoder_name(audio)),
            None => true,
        }
    }
}

/// Parse `ffmpeg -encoders` output into the set of encoder names.
///
/// Lines look like ` V....D libx264    H.264 / AVC ...`; everything
/// before the dashed separator is header.
fn parse_encoder_listing(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              H.264 / AVC / MPEG-4 AVC
 V....D libvpx-vp9           libvpx VP9
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libopus              libopus Opus
";

    #[test]
    fn test_parse_encoder_listing() {
        let encoders = parse_encoder_listing(SAMPLE_LISTING);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("libopus"));
        assert!(!encoders.contains("Encoders:"));
        assert!(!encoders.contains("="));
    }

    #[test]
    fn test_probe_requires_both_codecs_of_a_pair() {
        let probe = FfmpegCapabilityProbe {
            encoders: parse_encoder_listing(SAMPLE_LISTING),
        };
        let vp9_opus = CodecCandidate {
            container: "webm",
            video_codec: "vp9",
            audio_codec: Some("opus"),
            mime: "video/webm;codecs=vp9,opus",
        };
        assert!(probe.probe(&vp9_opus));

        let vp8_opus = CodecCandidate {
            container: "webm",
            video_codec: "vp8",
            audio_codec: Some("opus"),
            mime: "video/webm;codecs=vp8,opus",
        };
        assert!(!probe.probe(&vp8_opus));
    }

    #[test]
    fn test_empty_listing_rejects_wildcard() {
        let probe = FfmpegCapabilityProbe {
            encoders: HashSet::new(),
        };
        let wildcard = CodecCandidate {
            container: "",
            video_codec: "",
            audio_codec: None,
            mime: "video/*",
        };
        assert!(!probe.probe(&wildcard));
    }

    #[test]
    fn test_unmapped_audio_packets_are_counted_as_dropped() {
        let mut sink = FfmpegEncoderSink::new();
        for pts_ns in 0..3 {
            sink.write_audio(AudioPacket {
                data: vec![0xAB; 4],
                pts_ns,
            })
            .unwrap();
        }
        assert_eq!(sink.dropped_audio_packets(), 3);

        let mut mapped = FfmpegEncoderSink::new().with_audio_file("/tmp/original.mp4");
        mapped
            .write_audio(AudioPacket {
                data: vec![0xCD; 4],
                pts_ns: 0,
            })
            .unwrap();
        assert_eq!(mapped.dropped_audio_packets(), 0);
    }

    #[test]
    fn test_muxer_mapping() {
        assert_eq!(muxer_name("mp4"), "mp4");
        assert_eq!(muxer_name("webm"), "webm");
        assert_eq!(muxer_name(""), "matroska");
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1920,1080"), Some((1920, 1080)));
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("not,numbers"), None);
    }
}

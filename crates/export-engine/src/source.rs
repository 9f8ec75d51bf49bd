//! Frame source seam.
//!
//! The recorder never talks to a decoder directly; it pulls frames from
//! this trait. That keeps the frame loop testable without any real video
//! and lets the ffmpeg-backed file source live next to in-memory doubles.

use clipmark_enhance_core::RawFrame;
use clipmark_common::error::PipelineResult;
use clipmark_media_model::{AudioPacket, SourceInfo};

/// Result of asking a source for its next frame.
#[derive(Debug)]
pub enum FramePull {
    /// A decoded frame at the source's natural resolution.
    Frame(RawFrame),

    /// Nothing decodable yet; try again next tick.
    NotReady,

    /// The source has no more frames.
    EndOfInput,
}

/// An addressable video resource the pipeline reads from.
///
/// The source is read-only to the pipeline: implementations expose
/// decoded frames and pass-through audio but are never mutated beyond
/// their own read cursor.
pub trait FrameSource: Send {
    /// Stable identity of the underlying resource; the orchestrator keys
    /// its one-export-at-a-time guard on this.
    fn id(&self) -> &str;

    /// Current metadata. May report unknown dimensions/duration until
    /// the source has loaded enough to decode.
    fn info(&self) -> SourceInfo;

    /// Pull the next decodable frame.
    fn next_frame(&mut self) -> PipelineResult<FramePull>;

    /// Drain any original-audio packets that became available since the
    /// last call. Packets are merged into the output unmodified.
    fn pull_audio(&mut self) -> Vec<AudioPacket> {
        Vec::new()
    }
}

//! Encoder sink seam.
//!
//! The recorder feeds composited frames and pass-through audio into this
//! trait and collects the encoded chunks back when recording stops. A
//! sink is single-use: `begin` once, then frames/audio, then exactly one
//! of `finish` or `abort`.

use clipmark_common::error::PipelineResult;
use clipmark_enhance_core::RawFrame;
use clipmark_media_model::{AudioPacket, EncodedChunk};

use crate::codec::CodecChoice;

/// Encodes composited frames plus original audio into a container
/// byte stream.
pub trait EncoderSink: Send {
    /// Initialize the encoder for the negotiated format.
    ///
    /// Fails with `EncoderInitFailed` when the encoder cannot be
    /// constructed for this choice.
    fn begin(&mut self, codec: &CodecChoice, width: u32, height: u32, fps: u32)
        -> PipelineResult<()>;

    /// Encode one composited frame.
    fn write_frame(&mut self, frame: &RawFrame, pts_ns: u64) -> PipelineResult<()>;

    /// Mux one original-audio packet, unmodified.
    fn write_audio(&mut self, packet: AudioPacket) -> PipelineResult<()>;

    /// Flush the encoder and hand back all buffered chunks in emission
    /// order. Consumes the sink's buffers; the stream's ownership moves
    /// to the caller.
    fn finish(&mut self) -> PipelineResult<Vec<EncodedChunk>>;

    /// Discard everything without flushing. Used on cancel and on error
    /// paths; must release encoder resources and never fail.
    fn abort(&mut self);
}

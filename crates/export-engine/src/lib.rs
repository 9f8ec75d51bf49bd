//! Recording and export pipeline.
//!
//! The pipeline turns a frame source plus an enhancement configuration
//! into a delivery-format artifact: negotiate a recording format, drive
//! the compositor on a frame cadence into an encoder sink, then
//! transcode the intermediate stream if the negotiated format is not
//! already the delivery format.

pub mod codec;
pub mod encoder;
pub mod export;
pub mod ffmpeg;
pub mod recorder;
pub mod source;
pub mod transcode;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::{negotiate, CapabilityProbe, CodecCandidate, CodecChoice, StaticProbe};
pub use encoder::EncoderSink;
pub use export::{ExportOrchestrator, ExportStage, StageFailure};
pub use ffmpeg::{FfmpegCapabilityProbe, FfmpegEncoderSink, FfmpegFrameSource};
pub use recorder::{RecorderLimits, RecorderState, RecorderStats, StreamRecorder};
pub use source::{FramePull, FrameSource};
pub use transcode::{transcode, FfmpegTranscoder, TranscodeBackend, TranscodeParams};

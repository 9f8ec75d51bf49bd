//! Core data model for Clipmark exports.
//!
//! Value objects shared across the pipeline: enhancement configuration,
//! source metadata, intermediate streams, and output artifacts.

pub mod artifact;
pub mod enhancement;
pub mod source;

pub use artifact::{EncodedChunk, IntermediateStream, OutputArtifact};
pub use enhancement::{
    EnhancementConfig, FilterSettings, OverlayPosition, RgbColor, WatermarkPosition,
};
pub use source::{AudioPacket, SourceInfo};

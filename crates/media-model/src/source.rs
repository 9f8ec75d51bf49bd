//! Source video metadata.

use serde::{Deserialize, Serialize};

/// Metadata reported by a source video resource.
///
/// All fields except `has_audio` may be unknown until the source has
/// loaded enough of itself to decode; the recorder's priming phase waits
/// for `is_ready()` before the frame loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Natural (decoded) width and height; None until metadata is known.
    pub dimensions: Option<(u32, u32)>,

    /// Duration in seconds; None while unknown or unbounded.
    pub duration_secs: Option<f64>,

    /// Whether the source carries an audio track.
    pub has_audio: bool,
}

impl SourceInfo {
    /// Whether dimensions are known and non-degenerate.
    pub fn is_ready(&self) -> bool {
        matches!(self.dimensions, Some((w, h)) if w > 0 && h > 0)
    }

    /// Natural width, if known.
    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|(w, _)| w)
    }

    /// Natural height, if known.
    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|(_, h)| h)
    }
}

/// One opaque unit of original audio, passed through the pipeline
/// unmodified. The recorder moves packets from source to encoder sink;
/// it never inspects or resamples them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    /// Encoded or raw audio bytes, exactly as the source produced them.
    pub data: Vec<u8>,

    /// Presentation timestamp in nanoseconds from recording start.
    pub pts_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_requires_nonzero_dimensions() {
        let unknown = SourceInfo {
            dimensions: None,
            duration_secs: None,
            has_audio: false,
        };
        assert!(!unknown.is_ready());

        let degenerate = SourceInfo {
            dimensions: Some((0, 1080)),
            duration_secs: Some(8.0),
            has_audio: true,
        };
        assert!(!degenerate.is_ready());

        let ready = SourceInfo {
            dimensions: Some((1920, 1080)),
            duration_secs: None, // duration may still be unknown
            has_audio: true,
        };
        assert!(ready.is_ready());
    }
}

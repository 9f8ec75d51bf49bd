//! Container/codec negotiation.
//!
//! The negotiator walks a fixed preference ladder and returns the first
//! candidate the runtime's capability probe accepts. The ladder is a
//! total order, so for identical capabilities and the same `has_audio`
//! the outcome is always the same candidate.

use clipmark_common::error::{PipelineError, PipelineResult};

/// One container/codec pair the recorder could target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCandidate {
    /// Container name ("mp4", "webm"); empty for the wildcard.
    pub container: &'static str,

    /// Video codec inside the container; empty for the wildcard.
    pub video_codec: &'static str,

    /// Audio codec, if this candidate records audio.
    pub audio_codec: Option<&'static str>,

    /// MIME string the intermediate stream is tagged with.
    pub mime: &'static str,
}

impl CodecCandidate {
    /// The terminal "anything the runtime supports" candidate.
    pub fn is_wildcard(&self) -> bool {
        self.container.is_empty()
    }
}

/// The outcome of negotiation: what the encoder sink will be asked to
/// produce and the MIME tag for the resulting intermediate stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecChoice {
    pub container: String,
    pub video_codec: String,
    pub audio_codec: Option<String>,
    pub mime_type: String,
}

impl CodecChoice {
    fn from_candidate(candidate: &CodecCandidate) -> Self {
        Self {
            container: candidate.container.to_string(),
            video_codec: candidate.video_codec.to_string(),
            audio_codec: candidate.audio_codec.map(str::to_string),
            mime_type: candidate.mime.to_string(),
        }
    }

    /// Whether this choice already matches the delivery requirement, in
    /// which case the transcoder is skipped entirely.
    pub fn matches_delivery(&self, container: &str, video_codec: &str) -> bool {
        self.container == container && self.video_codec == video_codec
    }
}

/// Runtime capability check at the negotiation boundary.
///
/// Kept as a trait so the probing mechanism can be swapped per platform
/// without touching the ordering logic.
pub trait CapabilityProbe: Send + Sync {
    /// Whether the runtime can record this candidate.
    fn probe(&self, candidate: &CodecCandidate) -> bool;
}

/// Probe backed by a fixed capability list; deterministic by
/// construction. Useful for embedders that know their platform and for
/// tests.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    supported: Vec<(String, String)>,
}

impl StaticProbe {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            supported: supported
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        }
    }

    /// A probe that accepts nothing, not even the wildcard.
    pub fn unsupported() -> Self {
        Self::default()
    }
}

impl CapabilityProbe for StaticProbe {
    fn probe(&self, candidate: &CodecCandidate) -> bool {
        if candidate.is_wildcard() {
            return !self.supported.is_empty();
        }
        self.supported
            .iter()
            .any(|(c, v)| c == candidate.container && v == candidate.video_codec)
    }
}

/// The preference ladder, best first.
///
/// Native delivery format leads (with audio only when the source has
/// any), then the fallback pairs in descending quality, closing with the
/// wildcard. Audio-less variants of each pair stay in the ladder because
/// a runtime may support a video codec but not the paired audio codec.
pub fn preference_order(has_audio: bool) -> Vec<CodecCandidate> {
    let mut candidates = Vec::with_capacity(7);
    if has_audio {
        candidates.push(CodecCandidate {
            container: "mp4",
            video_codec: "h264",
            audio_codec: Some("aac"),
            mime: "video/mp4",
        });
    }
    candidates.push(CodecCandidate {
        container: "mp4",
        video_codec: "h264",
        audio_codec: None,
        mime: "video/mp4",
    });
    if has_audio {
        candidates.push(CodecCandidate {
            container: "webm",
            video_codec: "vp9",
            audio_codec: Some("opus"),
            mime: "video/webm;codecs=vp9,opus",
        });
    }
    candidates.push(CodecCandidate {
        container: "webm",
        video_codec: "vp9",
        audio_codec: None,
        mime: "video/webm;codecs=vp9",
    });
    if has_audio {
        candidates.push(CodecCandidate {
            container: "webm",
            video_codec: "vp8",
            audio_codec: Some("opus"),
            mime: "video/webm;codecs=vp8,opus",
        });
    }
    candidates.push(CodecCandidate {
        container: "webm",
        video_codec: "vp8",
        audio_codec: None,
        mime: "video/webm;codecs=vp8",
    });
    candidates.push(CodecCandidate {
        container: "",
        video_codec: "",
        audio_codec: None,
        mime: "video/*",
    });
    candidates
}

/// Pick the first candidate the probe accepts.
///
/// No supported candidate is fatal for the export: the orchestrator
/// surfaces `UnsupportedFormat` without retrying.
pub fn negotiate(probe: &dyn CapabilityProbe, has_audio: bool) -> PipelineResult<CodecChoice> {
    let candidates = preference_order(has_audio);
    let total = candidates.len();
    for candidate in &candidates {
        if probe.probe(candidate) {
            let choice = CodecChoice::from_candidate(candidate);
            tracing::debug!(
                container = %choice.container,
                video_codec = %choice.video_codec,
                audio = choice.audio_codec.is_some(),
                "Negotiated recording format"
            );
            return Ok(choice);
        }
    }
    Err(PipelineError::unsupported_format(format!(
        "none of {total} candidates supported (has_audio={has_audio})"
    )))
}

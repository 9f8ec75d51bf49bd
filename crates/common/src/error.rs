//! Error types shared across Clipmark crates.

/// Top-level error type for pipeline operations.
///
/// The taxonomy splits into input-state errors (retryable by the caller),
/// capability errors (not retryable without changing the target format),
/// resource errors (need an out-of-process fallback), execution errors
/// (safe to retry once), and control-flow outcomes (`Cancelled`,
/// `ExportInProgress`) that are not defects at all.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Frame not ready: source has no decodable frame yet")]
    FrameNotReady,

    #[error("Source not ready after {waited_secs:.1}s of priming")]
    SourceNotReady { waited_secs: f64 },

    #[error("Encoder error: {message}")]
    EncoderError { message: String },

    #[error("Encoder initialization failed: {message}")]
    EncoderInitFailed { message: String },

    #[error("Recording produced zero bytes")]
    EmptyOutput,

    #[error("No supported container/codec combination: {message}")]
    UnsupportedFormat { message: String },

    #[error("Input stream unreadable: {message}")]
    InputUnreadable { message: String },

    #[error("Input of {size_bytes} bytes exceeds inline transcode limit of {limit_bytes} bytes")]
    TooLargeForInlineTranscode { size_bytes: u64, limit_bytes: u64 },

    #[error("Timed out after {elapsed_secs:.1}s: {message}")]
    Timeout { message: String, elapsed_secs: f64 },

    #[error("Export cancelled by caller")]
    Cancelled,

    #[error("Export already in progress for source {source_id}")]
    ExportInProgress { source_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn encoder(msg: impl Into<String>) -> Self {
        Self::EncoderError {
            message: msg.into(),
        }
    }

    pub fn encoder_init(msg: impl Into<String>) -> Self {
        Self::EncoderInitFailed {
            message: msg.into(),
        }
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            message: msg.into(),
        }
    }

    pub fn input_unreadable(msg: impl Into<String>) -> Self {
        Self::InputUnreadable {
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>, elapsed_secs: f64) -> Self {
        Self::Timeout {
            message: msg.into(),
            elapsed_secs,
        }
    }

    /// Whether the caller may retry the same request and expect it to
    /// succeed. Input-state errors retry after backoff; execution errors
    /// are safe to retry once.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FrameNotReady
                | Self::SourceNotReady { .. }
                | Self::EncoderError { .. }
                | Self::EncoderInitFailed { .. }
                | Self::InputUnreadable { .. }
                | Self::EmptyOutput
                | Self::Timeout { .. }
        )
    }

    /// Control-flow outcomes are expected results of caller actions, not
    /// defects, and must be distinguishable from true errors.
    pub fn is_control_flow(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ExportInProgress { .. })
    }

    /// Environment-level capability errors; retrying without changing the
    /// target format cannot succeed.
    pub fn is_capability(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_disjoint() {
        let errors = [
            PipelineError::FrameNotReady,
            PipelineError::Cancelled,
            PipelineError::unsupported_format("none of 5 candidates"),
            PipelineError::TooLargeForInlineTranscode {
                size_bytes: 101,
                limit_bytes: 100,
            },
        ];
        for e in &errors {
            let classes = [e.is_retryable(), e.is_control_flow(), e.is_capability()];
            assert!(
                classes.iter().filter(|c| **c).count() <= 1,
                "{e} falls into more than one class"
            );
        }
    }

    #[test]
    fn test_control_flow_outcomes_are_not_retryable() {
        assert!(PipelineError::Cancelled.is_control_flow());
        assert!(!PipelineError::Cancelled.is_retryable());
        let busy = PipelineError::ExportInProgress {
            source_id: "clip-1".to_string(),
        };
        assert!(busy.is_control_flow());
    }

    #[test]
    fn test_size_guard_error_reports_both_sides() {
        let e = PipelineError::TooLargeForInlineTranscode {
            size_bytes: 104_857_601,
            limit_bytes: 104_857_600,
        };
        let msg = e.to_string();
        assert!(msg.contains("104857601"));
        assert!(msg.contains("104857600"));
    }
}

//! Export orchestrator: admission, negotiation, recording, transcoding.
//!
//! One export walks four stages in a fixed order and every failure is
//! reported with the stage it happened in, so a caller can tell a busy
//! source from a capability gap without string matching. The transcoder
//! engine is built lazily on first use: an export whose negotiated
//! format already matches delivery never constructs it.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use clipmark_common::clock::ExportClock;
use clipmark_common::config::ExportDefaults;
use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_media_model::{EnhancementConfig, OutputArtifact};

use crate::codec::{negotiate, CapabilityProbe};
use crate::encoder::EncoderSink;
use crate::recorder::{RecorderLimits, StreamRecorder};
use crate::source::FrameSource;
use crate::transcode::{transcode, FfmpegTranscoder, TranscodeBackend, TranscodeParams};

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Admission,
    Negotiate,
    Record,
    Transcode,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admission => "admission",
            Self::Negotiate => "negotiate",
            Self::Record => "record",
            Self::Transcode => "transcode",
        };
        f.write_str(name)
    }
}

/// An export failure with the stage it occurred in attached.
#[derive(Debug, thiserror::Error)]
#[error("export failed in {stage} stage: {error}")]
pub struct StageFailure {
    pub stage: ExportStage,
    #[source]
    pub error: PipelineError,
}

impl StageFailure {
    fn at(stage: ExportStage) -> impl FnOnce(PipelineError) -> Self {
        move |error| Self { stage, error }
    }
}

type TranscoderFactory = Box<dyn Fn() -> Arc<dyn TranscodeBackend> + Send + Sync>;

/// Removes the source id from the in-flight set when the export ends,
/// on every path.
struct FlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.id);
        }
    }
}

/// Runs exports end to end.
///
/// At most one export per source id is admitted at a time; a second
/// request for a busy source fails fast with `ExportInProgress` instead
/// of queueing.
pub struct ExportOrchestrator {
    defaults: ExportDefaults,
    probe: Arc<dyn CapabilityProbe>,
    make_transcoder: TranscoderFactory,
    transcoder: Mutex<Option<Arc<dyn TranscodeBackend>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ExportOrchestrator {
    pub fn new(defaults: ExportDefaults, probe: Arc<dyn CapabilityProbe>) -> Self {
        Self {
            defaults,
            probe,
            make_transcoder: Box::new(|| Arc::new(FfmpegTranscoder::new())),
            transcoder: Mutex::new(None),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replace the transcoder construction. The factory runs at most
    /// once, on the first export that needs a format conversion.
    pub fn with_transcoder_factory(
        mut self,
        factory: impl Fn() -> Arc<dyn TranscodeBackend> + Send + Sync + 'static,
    ) -> Self {
        self.make_transcoder = Box::new(factory);
        self
    }

    /// Run one export end to end.
    ///
    /// The cancel flag may be flipped from any task; cancellation
    /// surfaces as a `Record`-stage failure with `Cancelled` inside.
    pub async fn export(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn EncoderSink,
        config: &EnhancementConfig,
        cancel: Arc<AtomicBool>,
    ) -> Result<OutputArtifact, StageFailure> {
        let clock = ExportClock::start();
        let config = config.normalized();
        let _guard = self
            .admit(source.id())
            .map_err(StageFailure::at(ExportStage::Admission))?;
        tracing::debug!(
            source_id = source.id(),
            started_at = clock.epoch_wall(),
            "Export admitted"
        );

        let info = source.info();
        let choice = negotiate(self.probe.as_ref(), info.has_audio)
            .map_err(StageFailure::at(ExportStage::Negotiate))?;

        let mut recorder =
            StreamRecorder::new(RecorderLimits::from(&self.defaults)).with_cancel_flag(cancel);
        let stream = recorder
            .record(source, sink, &config, &choice)
            .await
            .map_err(StageFailure::at(ExportStage::Record))?;

        if choice.matches_delivery(
            &self.defaults.delivery_container,
            &self.defaults.delivery_video_codec,
        ) {
            tracing::info!(
                source_id = source.id(),
                bytes = stream.size_bytes(),
                mime = %stream.mime_type,
                elapsed_secs = clock.elapsed_secs(),
                "Export complete, native delivery format"
            );
            let mime = stream.mime_type.clone();
            return Ok(OutputArtifact::new(stream.bytes, mime));
        }

        let backend = self.transcoder_engine();
        let params = TranscodeParams::from_defaults(&self.defaults);
        let artifact = tokio::task::spawn_blocking(move || {
            transcode(backend.as_ref(), &stream, &params)
        })
        .await
        .map_err(|e| StageFailure {
            stage: ExportStage::Transcode,
            error: PipelineError::encoder(format!("transcode task failed: {e}")),
        })?
        .map_err(StageFailure::at(ExportStage::Transcode))?;

        tracing::info!(
            source_id = source.id(),
            bytes = artifact.size_bytes,
            mime = %artifact.mime_type,
            elapsed_secs = clock.elapsed_secs(),
            "Export complete, transcoded to delivery format"
        );
        Ok(artifact)
    }

    /// Release the transcoder engine. The next export that needs one
    /// rebuilds it through the factory.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.transcoder.lock() {
            if slot.take().is_some() {
                tracing::debug!("Transcoder engine released");
            }
        }
    }

    fn admit(&self, source_id: &str) -> PipelineResult<FlightGuard> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| PipelineError::encoder("in-flight set poisoned"))?;
        if !set.insert(source_id.to_string()) {
            return Err(PipelineError::ExportInProgress {
                source_id: source_id.to_string(),
            });
        }
        Ok(FlightGuard {
            in_flight: self.in_flight.clone(),
            id: source_id.to_string(),
        })
    }

    fn transcoder_engine(&self) -> Arc<dyn TranscodeBackend> {
        let mut slot = match self.transcoder.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.get_or_insert_with(|| {
            let engine = (self.make_transcoder)();
            tracing::debug!(backend = engine.name(), "Transcoder engine constructed");
            engine
        })
        .clone()
    }
}

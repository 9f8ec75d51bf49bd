//! Stream recorder: drives the compositor on a frame cadence and feeds
//! an encoder sink.
//!
//! The recorder is an explicit state machine:
//!
//! ```text
//! Idle -> Priming -> Recording -> Stopping -> { Completed | Failed }
//! ```
//!
//! Three competing signals can stop a recording: end-of-input from the
//! source, the safety timer, and caller cancellation. They are resolved
//! once per tick in that fixed priority order, and the first signal to
//! latch is authoritative — the end-of-input event is not guaranteed to
//! fire for every source, so the safety timer is mandatory, not a
//! debugging aid.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::{interval, sleep, Duration, Instant};

use clipmark_common::config::ExportDefaults;
use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_enhance_core::{composite, RawFrame};
use clipmark_media_model::{EnhancementConfig, IntermediateStream};

use crate::codec::CodecChoice;
use crate::encoder::EncoderSink;
use crate::source::{FramePull, FrameSource};

/// How often the priming phase re-polls a not-yet-ready source.
const PRIMING_POLL: Duration = Duration::from_millis(50);

/// Recorder lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Created, not yet started.
    Idle,
    /// Waiting for the source to produce a first decodable frame.
    Priming,
    /// Frame loop running.
    Recording,
    /// A stop signal latched; flushing or discarding the encoder.
    Stopping,
    /// Stream handed to the caller.
    Completed,
    /// Recording did not produce a stream.
    Failed,
}

/// Why the frame loop stopped. Priority order, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    EndOfInput,
    SafetyTimer,
    Cancelled,
}

/// Hard bounds for one recording.
#[derive(Debug, Clone, Copy)]
pub struct RecorderLimits {
    /// Frame cadence of the compositing loop.
    pub fps: u32,

    /// Priming phase bound; exceeding it is a failure, not a retry.
    pub priming_timeout: Duration,

    /// Recording ceiling when the source duration is unknown.
    pub default_ceiling: Duration,

    /// Slack added to the expected duration before the safety timer
    /// forces a stop.
    pub stop_slack: Duration,
}

impl From<&ExportDefaults> for RecorderLimits {
    fn from(defaults: &ExportDefaults) -> Self {
        Self {
            fps: defaults.fps.max(1),
            priming_timeout: Duration::from_secs_f64(defaults.priming_timeout_secs),
            default_ceiling: Duration::from_secs_f64(defaults.recording_ceiling_secs),
            stop_slack: Duration::from_secs_f64(defaults.stop_slack_secs),
        }
    }
}

/// Counters reported when a recording stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderStats {
    /// Scheduling ticks observed.
    pub ticks: u64,

    /// Composited frames handed to the encoder.
    pub frames_encoded: u64,

    /// Ticks skipped because no frame was decodable.
    pub frames_skipped: u64,

    /// Original-audio packets passed through.
    pub audio_packets: u64,
}

/// Decrements the loop-liveness gauge when the frame loop exits, on
/// every path.
struct LoopGuard {
    gauge: Arc<AtomicU64>,
}

impl LoopGuard {
    fn enter(gauge: Arc<AtomicU64>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self { gauge }
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Single-use recorder for one export.
///
/// Owns the intermediate stream until `record` returns, at which point
/// ownership moves to the caller.
pub struct StreamRecorder {
    limits: RecorderLimits,
    state: RecorderState,
    cancel: Arc<AtomicBool>,
    live_loops: Arc<AtomicU64>,
    stats: RecorderStats,
}

impl StreamRecorder {
    pub fn new(limits: RecorderLimits) -> Self {
        Self {
            limits,
            state: RecorderState::Idle,
            cancel: Arc::new(AtomicBool::new(false)),
            live_loops: Arc::new(AtomicU64::new(0)),
            stats: RecorderStats::default(),
        }
    }

    /// Flag a caller can set from another task to cancel the recording.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Share an externally owned cancel flag instead of the built-in one.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Gauge of live frame loops; returns to zero on every exit path.
    pub fn live_loops(&self) -> Arc<AtomicU64> {
        self.live_loops.clone()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// The single authoritative state transition point.
    fn transition(&mut self, next: RecorderState) {
        debug_assert!(
            transition_allowed(self.state, next),
            "illegal recorder transition {:?} -> {next:?}",
            self.state
        );
        tracing::debug!(from = ?self.state, to = ?next, "Recorder state change");
        self.state = next;
    }

    /// Run one recording to completion.
    ///
    /// On success the returned stream holds all encoded chunks
    /// concatenated in arrival order, tagged with the negotiated MIME
    /// type. On every failure path the sink has been aborted and the
    /// frame loop released.
    pub async fn record(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn EncoderSink,
        config: &EnhancementConfig,
        codec: &CodecChoice,
    ) -> PipelineResult<IntermediateStream> {
        self.transition(RecorderState::Priming);

        let first_frame = match self.prime(source).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                // Source ended before producing a single frame.
                self.transition(RecorderState::Failed);
                return Err(PipelineError::EmptyOutput);
            }
            Err(e) => {
                self.transition(RecorderState::Failed);
                return Err(e);
            }
        };

        let (width, height) = (first_frame.width(), first_frame.height());
        if let Err(e) = sink.begin(codec, width, height, self.limits.fps) {
            sink.abort();
            self.transition(RecorderState::Failed);
            return Err(e);
        }

        let info = source.info();
        let ceiling = match info.duration_secs {
            Some(secs) => self
                .limits
                .default_ceiling
                .max(Duration::from_secs_f64(secs)),
            None => self.limits.default_ceiling,
        };
        let deadline = Instant::now() + ceiling + self.limits.stop_slack;

        tracing::info!(
            width,
            height,
            fps = self.limits.fps,
            has_audio = info.has_audio,
            safety_secs = (ceiling + self.limits.stop_slack).as_secs_f64(),
            mime = %codec.mime_type,
            "Recording started"
        );

        self.transition(RecorderState::Recording);
        let loop_result = self
            .frame_loop(source, sink, config, deadline, first_frame)
            .await;
        self.transition(RecorderState::Stopping);

        let reason = match loop_result {
            Ok(StopReason::Cancelled) => {
                // Discard without flushing; cancellation is never a
                // silent success.
                sink.abort();
                self.transition(RecorderState::Failed);
                return Err(PipelineError::Cancelled);
            }
            Ok(reason) => reason,
            Err(e) => {
                sink.abort();
                self.transition(RecorderState::Failed);
                return Err(e);
            }
        };

        let chunks = match sink.finish() {
            Ok(chunks) => chunks,
            Err(e) => {
                self.transition(RecorderState::Failed);
                return Err(e);
            }
        };

        let stream = IntermediateStream::from_chunks(chunks, codec.mime_type.clone());
        if stream.is_empty() {
            self.transition(RecorderState::Failed);
            return Err(PipelineError::EmptyOutput);
        }

        tracing::info!(
            ?reason,
            ticks = self.stats.ticks,
            frames_encoded = self.stats.frames_encoded,
            frames_skipped = self.stats.frames_skipped,
            audio_packets = self.stats.audio_packets,
            bytes = stream.size_bytes(),
            "Recording stopped"
        );
        self.transition(RecorderState::Completed);
        Ok(stream)
    }

    /// Wait until the source yields its first decodable frame.
    ///
    /// Returns `Ok(None)` when the source ends before any frame.
    async fn prime(&mut self, source: &mut dyn FrameSource) -> PipelineResult<Option<RawFrame>> {
        let started = Instant::now();
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(PipelineError::Cancelled);
            }
            match source.next_frame()? {
                FramePull::Frame(frame) if !frame.is_empty() => return Ok(Some(frame)),
                FramePull::Frame(_) | FramePull::NotReady => {}
                FramePull::EndOfInput => return Ok(None),
            }
            let waited = started.elapsed();
            if waited >= self.limits.priming_timeout {
                return Err(PipelineError::SourceNotReady {
                    waited_secs: waited.as_secs_f64(),
                });
            }
            sleep(PRIMING_POLL).await;
        }
    }

    /// The per-tick frame loop. Returns the stop reason, or an error for
    /// execution failures (encoder or source); the caller owns flushing
    /// or aborting the sink either way.
    async fn frame_loop(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn EncoderSink,
        config: &EnhancementConfig,
        deadline: Instant,
        first_frame: RawFrame,
    ) -> PipelineResult<StopReason> {
        let _guard = LoopGuard::enter(self.live_loops.clone());
        let interval_ns = 1_000_000_000u64 / self.limits.fps as u64;
        let mut ticker = interval(Duration::from_nanos(interval_ns));
        let mut pending = Some(first_frame);
        let mut end_of_input = false;

        loop {
            ticker.tick().await;
            self.stats.ticks += 1;

            // Stop-signal resolution; fixed priority, first latch wins.
            if end_of_input {
                return Ok(StopReason::EndOfInput);
            }
            if Instant::now() >= deadline {
                return Ok(StopReason::SafetyTimer);
            }
            if self.cancel.load(Ordering::SeqCst) {
                return Ok(StopReason::Cancelled);
            }

            let pull = match pending.take() {
                Some(frame) => FramePull::Frame(frame),
                None => source.next_frame()?,
            };
            match pull {
                FramePull::Frame(frame) => match composite(&frame, config) {
                    Ok(composited) => {
                        let pts_ns = self.stats.frames_encoded * interval_ns;
                        sink.write_frame(&composited, pts_ns)?;
                        self.stats.frames_encoded += 1;
                    }
                    Err(PipelineError::FrameNotReady) => {
                        self.stats.frames_skipped += 1;
                    }
                    Err(e) => return Err(e),
                },
                FramePull::NotReady => {
                    self.stats.frames_skipped += 1;
                }
                FramePull::EndOfInput => {
                    end_of_input = true;
                }
            }

            for packet in source.pull_audio() {
                sink.write_audio(packet)?;
                self.stats.audio_packets += 1;
            }
        }
    }
}

fn transition_allowed(from: RecorderState, to: RecorderState) -> bool {
    use RecorderState::*;
    matches!(
        (from, to),
        (Idle, Priming)
            | (Priming, Recording)
            | (Priming, Failed)
            | (Recording, Stopping)
            | (Stopping, Completed)
            | (Stopping, Failed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{negotiate, StaticProbe};
    use crate::testutil::{MockSource, MemorySink, SinkProbe};

    fn test_limits() -> RecorderLimits {
        RecorderLimits {
            fps: 30,
            priming_timeout: Duration::from_secs(30),
            default_ceiling: Duration::from_secs(10),
            stop_slack: Duration::from_secs(1),
        }
    }

    fn mp4_choice() -> CodecChoice {
        negotiate(&StaticProbe::new([("mp4", "h264")]), true).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_finite_source_completes_with_nonempty_stream() {
        let mut source = MockSource::new("clip-a", 64, 48).frames(24).ends(true);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());

        let stream = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap();

        assert_eq!(recorder.state(), RecorderState::Completed);
        assert!(stream.size_bytes() > 0);
        assert_eq!(stream.mime_type, "video/mp4");
        assert_eq!(stream.chunk_count, 24);
        assert!(probe.finished());
        assert!(!probe.aborted());
        assert_eq!(recorder.live_loops().load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timer_stops_source_that_never_ends() {
        // Source stops producing but never signals end-of-input; its known
        // duration exceeds the default ceiling, so the timer arms at
        // duration + slack.
        let mut source = MockSource::new("clip-b", 32, 32)
            .frames(5)
            .ends(false)
            .duration(5.0);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let limits = RecorderLimits {
            default_ceiling: Duration::from_secs(2),
            stop_slack: Duration::from_secs(1),
            ..test_limits()
        };
        let mut recorder = StreamRecorder::new(limits);

        let stream = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap();

        // Terminated via the safety timer, still a completed export.
        assert_eq!(recorder.state(), RecorderState::Completed);
        assert_eq!(stream.chunk_count, 5);
        assert!(recorder.stats().ticks >= 5);
        assert_eq!(recorder.live_loops().load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_recording_aborts_without_flush() {
        let mut source = MockSource::new("clip-c", 32, 32).endless();
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());
        let live = recorder.live_loops();

        let cancel = recorder.cancel_flag();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            cancel.store(true, Ordering::SeqCst);
        });

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(err.is_control_flow());
        assert_eq!(recorder.state(), RecorderState::Failed);
        assert!(probe.aborted());
        assert!(!probe.finished());
        // No dangling scheduling loop.
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_priming_timeout_fails_with_source_not_ready() {
        let mut source = MockSource::new("clip-d", 32, 32).never_ready();
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::SourceNotReady { waited_secs } if waited_secs >= 30.0));
        assert_eq!(recorder.state(), RecorderState::Failed);
        // The encoder was never initialized.
        assert!(!probe.began());
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_ending_before_first_frame_is_empty_output() {
        let mut source = MockSource::new("clip-e", 32, 32).frames(0).ends(true);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyOutput));
        assert_eq!(recorder.state(), RecorderState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_failure_aborts_recording() {
        let mut source = MockSource::new("clip-f", 32, 32).endless();
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone()).fail_after_frames(3);
        let mut recorder = StreamRecorder::new(test_limits());

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EncoderError { .. }));
        assert!(err.is_retryable());
        assert!(probe.aborted());
        assert_eq!(recorder.live_loops().load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_begin_failure_fails_before_recording() {
        let mut source = MockSource::new("clip-i", 32, 32).frames(4).ends(true);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone()).fail_begin();
        let mut recorder = StreamRecorder::new(test_limits());

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::EncoderInitFailed { .. }));
        assert_eq!(recorder.state(), RecorderState::Failed);
        assert!(probe.aborted());
        assert_eq!(probe.frames(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_frame_wins() {
        let mut source = MockSource::new("clip-g", 32, 32).frames(1).ends(true);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());
        recorder.cancel_flag().store(true, Ordering::SeqCst);

        let err = recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_packets_pass_through_unmodified() {
        let mut source = MockSource::new("clip-h", 32, 32)
            .frames(6)
            .ends(true)
            .audio_per_pull(2);
        let probe = SinkProbe::default();
        let mut sink = MemorySink::new(probe.clone());
        let mut recorder = StreamRecorder::new(test_limits());

        recorder
            .record(
                &mut source,
                &mut sink,
                &EnhancementConfig::default(),
                &mp4_choice(),
            )
            .await
            .unwrap();

        assert!(recorder.stats().audio_packets >= 12);
        assert_eq!(probe.audio_packets(), recorder.stats().audio_packets);
    }
}

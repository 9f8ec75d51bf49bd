//! In-memory doubles for the source and encoder seams.

use std::sync::{Arc, Mutex};

use clipmark_common::error::{PipelineError, PipelineResult};
use clipmark_enhance_core::RawFrame;
use clipmark_media_model::{AudioPacket, EncodedChunk, SourceInfo};

use crate::codec::CodecChoice;
use crate::encoder::EncoderSink;
use crate::source::{FramePull, FrameSource};

/// Scripted frame source.
pub(crate) struct MockSource {
    id: String,
    width: u32,
    height: u32,
    duration_secs: Option<f64>,
    has_audio: bool,
    /// Frames to produce before drying up; None = endless.
    total_frames: Option<u64>,
    /// Whether end-of-input is signalled once frames run out.
    signals_end: bool,
    /// Pulls to answer with NotReady before the first frame.
    not_ready_pulls: u64,
    audio_per_pull: usize,
    produced: u64,
    audio_pts_ns: u64,
}

impl MockSource {
    pub fn new(id: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            width,
            height,
            duration_secs: None,
            has_audio: false,
            total_frames: Some(0),
            signals_end: true,
            not_ready_pulls: 0,
            audio_per_pull: 0,
            produced: 0,
            audio_pts_ns: 0,
        }
    }

    pub fn frames(mut self, count: u64) -> Self {
        self.total_frames = Some(count);
        self
    }

    pub fn endless(mut self) -> Self {
        self.total_frames = None;
        self
    }

    pub fn ends(mut self, signals_end: bool) -> Self {
        self.signals_end = signals_end;
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.not_ready_pulls = u64::MAX;
        self
    }

    pub fn audio_per_pull(mut self, packets: usize) -> Self {
        self.audio_per_pull = packets;
        self.has_audio = packets > 0;
        self
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

impl FrameSource for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            dimensions: Some((self.width, self.height)),
            duration_secs: self.duration_secs,
            has_audio: self.has_audio,
        }
    }

    fn next_frame(&mut self) -> PipelineResult<FramePull> {
        if self.not_ready_pulls > 0 {
            self.not_ready_pulls -= 1;
            return Ok(FramePull::NotReady);
        }
        match self.total_frames {
            Some(total) if self.produced >= total => {
                if self.signals_end {
                    Ok(FramePull::EndOfInput)
                } else {
                    Ok(FramePull::NotReady)
                }
            }
            _ => {
                self.produced += 1;
                Ok(FramePull::Frame(RawFrame::new(self.width, self.height)))
            }
        }
    }

    fn pull_audio(&mut self) -> Vec<AudioPacket> {
        (0..self.audio_per_pull)
            .map(|_| {
                self.audio_pts_ns += 1;
                AudioPacket {
                    data: vec![0xAB; 16],
                    pts_ns: self.audio_pts_ns,
                }
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct SinkState {
    began: bool,
    finished: bool,
    aborted: bool,
    frames: u64,
    audio_packets: u64,
}

/// Shared observation handle for a [`MemorySink`].
#[derive(Debug, Clone, Default)]
pub(crate) struct SinkProbe(Arc<Mutex<SinkState>>);

impl SinkProbe {
    pub fn began(&self) -> bool {
        self.0.lock().unwrap().began
    }

    pub fn finished(&self) -> bool {
        self.0.lock().unwrap().finished
    }

    pub fn aborted(&self) -> bool {
        self.0.lock().unwrap().aborted
    }

    pub fn frames(&self) -> u64 {
        self.0.lock().unwrap().frames
    }

    pub fn audio_packets(&self) -> u64 {
        self.0.lock().unwrap().audio_packets
    }
}

/// Encoder sink that buffers fixed-size chunks in memory.
pub(crate) struct MemorySink {
    probe: SinkProbe,
    bytes_per_frame: usize,
    chunks: Vec<EncodedChunk>,
    fail_begin: bool,
    fail_after_frames: Option<u64>,
    sequence: u64,
}

impl MemorySink {
    pub fn new(probe: SinkProbe) -> Self {
        Self {
            probe,
            bytes_per_frame: 64,
            chunks: Vec::new(),
            fail_begin: false,
            fail_after_frames: None,
            sequence: 0,
        }
    }

    pub fn fail_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn fail_after_frames(mut self, frames: u64) -> Self {
        self.fail_after_frames = Some(frames);
        self
    }
}

impl EncoderSink for MemorySink {
    fn begin(
        &mut self,
        _codec: &CodecChoice,
        _width: u32,
        _height: u32,
        _fps: u32,
    ) -> PipelineResult<()> {
        if self.fail_begin {
            return Err(PipelineError::encoder_init("mock encoder refused to start"));
        }
        self.probe.0.lock().unwrap().began = true;
        Ok(())
    }

    fn write_frame(&mut self, _frame: &RawFrame, _pts_ns: u64) -> PipelineResult<()> {
        let mut state = self.probe.0.lock().unwrap();
        if let Some(limit) = self.fail_after_frames {
            if state.frames >= limit {
                return Err(PipelineError::encoder("mock encoder write failure"));
            }
        }
        state.frames += 1;
        drop(state);
        self.chunks.push(EncodedChunk {
            data: vec![0u8; self.bytes_per_frame],
            sequence: self.sequence,
        });
        self.sequence += 1;
        Ok(())
    }

    fn write_audio(&mut self, _packet: AudioPacket) -> PipelineResult<()> {
        self.probe.0.lock().unwrap().audio_packets += 1;
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<Vec<EncodedChunk>> {
        self.probe.0.lock().unwrap().finished = true;
        Ok(std::mem::take(&mut self.chunks))
    }

    fn abort(&mut self) {
        self.probe.0.lock().unwrap().aborted = true;
        self.chunks.clear();
    }
}

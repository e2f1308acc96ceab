//! Segment capture: a rolling pre-roll ring plus the buffer for the segment
//! currently being spoken, and the encode/emit decision when a segment closes.

use super::mixer::SourceKind;
use super::vad::{SpeechOutcome, SpeechVerdict};
use super::{TARGET_CHANNELS, TARGET_RATE};
use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::VecDeque;
use std::io::Cursor;

/// A finished segment that passed every gate, ready for transcription.
#[derive(Debug, Clone)]
pub struct EmittedSegment {
    pub seq: u64,
    pub wav: Vec<u8>,
    pub duration_ms: u64,
    pub peak: f32,
    pub kind: SourceKind,
}

/// Why a segment closed, for logs and counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SegmentEnd {
    /// Silence confirmation ended it and it was emitted.
    Silence,
    /// Session stopped while the segment was open.
    ManualStop,
    /// Shorter than the minimum speech duration.
    DiscardShort,
    /// Peak never cleared the base threshold.
    DiscardQuiet,
    /// Encoded WAV was too small to be worth transcribing.
    DiscardSmall,
}

impl SegmentEnd {
    pub fn label(self) -> &'static str {
        match self {
            SegmentEnd::Silence => "silence",
            SegmentEnd::ManualStop => "manual_stop",
            SegmentEnd::DiscardShort => "discard_short",
            SegmentEnd::DiscardQuiet => "discard_quiet",
            SegmentEnd::DiscardSmall => "discard_small",
        }
    }
}

/// Per-segment numbers reported once at close.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMetrics {
    pub seq: u64,
    pub end: SegmentEnd,
    pub duration_ms: u64,
    pub peak: f32,
    pub samples: usize,
    /// Encoded size; zero when the segment was discarded before encoding.
    pub wav_bytes: usize,
}

#[derive(Debug, Clone)]
pub enum SegmentClose {
    Emitted(EmittedSegment, SegmentMetrics),
    Discarded(SegmentMetrics),
}

impl SegmentClose {
    pub fn metrics(&self) -> &SegmentMetrics {
        match self {
            SegmentClose::Emitted(_, metrics) => metrics,
            SegmentClose::Discarded(metrics) => metrics,
        }
    }
}

/// Collects mixed audio into segments.
///
/// The ring always holds the most recent `pre_roll_ms` of audio so a segment
/// starts slightly before its onset tick and the first word survives intact.
pub struct SegmentRecorder {
    ring: VecDeque<f32>,
    ring_capacity: usize,
    active: Option<Vec<f32>>,
    min_wav_bytes: usize,
    next_seq: u64,
}

impl SegmentRecorder {
    pub fn new(pre_roll_ms: u64, min_wav_bytes: usize) -> Self {
        let ring_capacity = (TARGET_RATE as u64 * pre_roll_ms / 1_000) as usize;
        Self {
            ring: VecDeque::with_capacity(ring_capacity),
            ring_capacity,
            active: None,
            min_wav_bytes,
            next_seq: 0,
        }
    }

    /// Feed this tick's mixed audio. The ring advances regardless of state;
    /// an open segment receives the chunk as well.
    pub fn absorb(&mut self, chunk: &[f32]) {
        if let Some(active) = self.active.as_mut() {
            active.extend_from_slice(chunk);
        }
        if self.ring_capacity == 0 {
            return;
        }
        for &sample in chunk {
            if self.ring.len() == self.ring_capacity {
                self.ring.pop_front();
            }
            self.ring.push_back(sample);
        }
    }

    /// Start a segment, seeded with the pre-roll ring contents.
    pub fn open(&mut self) {
        if self.active.is_none() {
            self.active = Some(self.ring.iter().copied().collect());
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    /// Close the open segment with the detector's outcome and decide its fate.
    pub fn close(&mut self, outcome: &SpeechOutcome) -> Result<SegmentClose> {
        let samples = self.active.take().unwrap_or_default();
        let seq = self.next_seq;
        self.next_seq += 1;
        let metrics = |end: SegmentEnd, wav_bytes: usize| SegmentMetrics {
            seq,
            end,
            duration_ms: outcome.duration_ms,
            peak: outcome.peak,
            samples: samples.len(),
            wav_bytes,
        };
        match outcome.verdict {
            SpeechVerdict::Cancelled => {
                Ok(SegmentClose::Discarded(metrics(SegmentEnd::ManualStop, 0)))
            }
            SpeechVerdict::TooShort => {
                Ok(SegmentClose::Discarded(metrics(SegmentEnd::DiscardShort, 0)))
            }
            SpeechVerdict::TooQuiet => {
                Ok(SegmentClose::Discarded(metrics(SegmentEnd::DiscardQuiet, 0)))
            }
            SpeechVerdict::Emit => {
                let wav = encode_wav(&samples)?;
                if wav.len() < self.min_wav_bytes {
                    return Ok(SegmentClose::Discarded(metrics(
                        SegmentEnd::DiscardSmall,
                        wav.len(),
                    )));
                }
                let wav_bytes = wav.len();
                let segment = EmittedSegment {
                    seq,
                    wav,
                    duration_ms: outcome.duration_ms,
                    peak: outcome.peak,
                    kind: outcome.kind,
                };
                Ok(SegmentClose::Emitted(segment, metrics(SegmentEnd::Silence, wav_bytes)))
            }
        }
    }

    /// Drop everything buffered, including the pre-roll ring.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.active = None;
    }
}

/// Encode 16 kHz mono f32 samples as 16-bit PCM WAV, in memory.
fn encode_wav(samples: &[f32]) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: TARGET_CHANNELS,
        sample_rate: TARGET_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).context("failed to start wav encoder")?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value).context("failed to encode wav sample")?;
        }
        writer.finalize().context("failed to finalize wav")?;
    }
    Ok(cursor.into_inner())
}

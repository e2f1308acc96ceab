//! Dual-source mix graph. Capture callbacks push device-rate frames over
//! channels; once per tick the graph drains every strip, converts to the
//! target rate, meters each source, and sums the strips into one mono chunk.

use super::meter::{measure_level, SourceAnalysis};
use super::resample::resample_to_target;
use super::TARGET_RATE;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resolution of the per-source byte spectrum (a 256-point analysis window).
pub const SPECTRUM_BINS: usize = 128;

/// Which physical capture a strip belongs to. Detection thresholds differ by
/// class, so the kind rides along with every level reading.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Mic,
    System,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Mic => "mic",
            SourceKind::System => "system",
        }
    }
}

/// One source's lane through the mixer: its frame channel, gain, and the
/// analysis state that smooths its spectrum between ticks.
pub struct SourceStrip {
    kind: SourceKind,
    device_rate: u32,
    gain: f32,
    rx: Receiver<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
    analysis: SourceAnalysis,
}

impl SourceStrip {
    pub fn new(
        kind: SourceKind,
        device_rate: u32,
        gain: f32,
        rx: Receiver<Vec<f32>>,
        dropped: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            kind,
            device_rate,
            gain,
            rx,
            dropped,
            // Metering happens after rate conversion, so the analysis always
            // runs at the target rate regardless of the device.
            analysis: SourceAnalysis::new(TARGET_RATE, SPECTRUM_BINS),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Frames the capture callback had to drop because the channel was full.
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Output of one mixer tick: the summed mono chunk plus a level reading per
/// strip, measured before gain so a muted source still registers speech.
#[derive(Debug, Clone, PartialEq)]
pub struct MixTick {
    pub mixed: Vec<f32>,
    pub levels: Vec<(SourceKind, f32)>,
}

impl MixTick {
    /// The strip with the highest level this tick, if any produced one.
    pub fn loudest(&self) -> Option<(SourceKind, f32)> {
        self.levels
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[derive(Default)]
pub struct MixerGraph {
    strips: Vec<SourceStrip>,
}

impl MixerGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_strip(&mut self, strip: SourceStrip) {
        self.strips.push(strip);
    }

    pub fn is_empty(&self) -> bool {
        self.strips.is_empty()
    }

    pub fn strips(&self) -> &[SourceStrip] {
        &self.strips
    }

    /// Drain every strip and produce this tick's mix.
    ///
    /// Strip chunks can differ in length (devices batch differently), so the
    /// mix buffer grows to the longest chunk and shorter strips simply stop
    /// contributing early. The sum is clamped to [-1, 1].
    pub fn poll(&mut self) -> MixTick {
        let mut mixed: Vec<f32> = Vec::new();
        let mut levels = Vec::with_capacity(self.strips.len());
        for strip in &mut self.strips {
            let mut chunk: Vec<f32> = Vec::new();
            for frame in strip.rx.try_iter() {
                chunk.extend_from_slice(&frame);
            }
            let converted = if strip.device_rate == TARGET_RATE {
                chunk
            } else {
                resample_to_target(&chunk, strip.device_rate)
            };
            let spectrum = strip.analysis.spectrum(&converted);
            let waveform = strip.analysis.waveform(&converted);
            levels.push((strip.kind, measure_level(&spectrum, &waveform)));
            if mixed.len() < converted.len() {
                mixed.resize(converted.len(), 0.0);
            }
            for (slot, sample) in mixed.iter_mut().zip(converted.iter()) {
                *slot += sample * strip.gain;
            }
        }
        for sample in mixed.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        MixTick { mixed, levels }
    }
}

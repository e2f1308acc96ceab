//! Loudness estimation on the byte scale used by the VAD thresholds.
//!
//! Levels live on a 0-255 scale: the mean of byte-valued spectrum magnitudes,
//! or a scaled time-domain RMS when the spectrum is degenerate. Some virtual
//! system-audio taps report an all-zero spectrum while still carrying signal,
//! which is why the fallback exists.

use super::WAVEFORM_MIDPOINT;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// dB mapped to byte 0 in the spectrum scale.
const SPECTRUM_MIN_DB: f32 = -100.0;
/// dB mapped to byte 255 in the spectrum scale.
const SPECTRUM_MAX_DB: f32 = -30.0;
/// Per-bin exponential smoothing applied across consecutive windows.
const SPECTRUM_SMOOTHING: f32 = 0.8;

/// Arithmetic mean of byte-valued spectrum magnitudes.
pub fn spectrum_mean(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / bins.len() as f32
}

/// RMS deviation of byte-valued waveform samples from the 128 midpoint.
pub fn waveform_rms(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples
        .iter()
        .map(|&s| {
            let deviation = f32::from(s) - WAVEFORM_MIDPOINT;
            deviation * deviation
        })
        .sum::<f32>()
        / samples.len() as f32;
    energy.sqrt()
}

/// Scalar loudness for one source this tick.
///
/// The spectrum mean is the primary estimate; a mean of exactly zero means
/// frequency analysis yielded nothing useful, and the time-domain RMS
/// (scaled x2 into a comparable range) takes over.
pub fn measure_level(spectrum: &[u8], waveform: &[u8]) -> f32 {
    let mean = spectrum_mean(spectrum);
    if mean == 0.0 {
        return waveform_rms(waveform) * 2.0;
    }
    mean
}

/// Converts raw f32 PCM windows into the byte-scale spectrum and waveform
/// buffers the level meter consumes. One per source tap.
///
/// The spectrum is a Goertzel bank over evenly spaced bins up to Nyquist,
/// mapped from dB into bytes the way browser analysers do, with the same
/// exponential smoothing across windows.
pub struct SourceAnalysis {
    sample_rate: u32,
    bins: usize,
    smoothed: Vec<f32>,
}

impl SourceAnalysis {
    pub fn new(sample_rate: u32, bins: usize) -> Self {
        let bins = bins.max(1);
        Self {
            sample_rate,
            bins,
            smoothed: vec![0.0; bins],
        }
    }

    /// Byte spectrum for this window. Empty windows zero out the smoothed
    /// state so a stalled tap reads as silent rather than holding its last
    /// level forever.
    pub fn spectrum(&mut self, samples: &[f32]) -> Vec<u8> {
        if samples.is_empty() {
            self.smoothed.fill(0.0);
            return vec![0; self.bins];
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        let mut out = Vec::with_capacity(self.bins);
        for bin in 0..self.bins {
            // Bin centers span (0, nyquist); bin 0 sits just above DC.
            let freq = nyquist * (bin as f32 + 0.5) / self.bins as f32;
            let amplitude = goertzel_amplitude(samples, self.sample_rate, freq);
            let prev = self.smoothed[bin];
            let smoothed = SPECTRUM_SMOOTHING * prev + (1.0 - SPECTRUM_SMOOTHING) * amplitude;
            self.smoothed[bin] = smoothed;
            out.push(amplitude_to_byte(smoothed));
        }
        out
    }

    /// Byte waveform for this window: [-1, 1] mapped around the 128 midpoint.
    pub fn waveform(&self, samples: &[f32]) -> Vec<u8> {
        samples
            .iter()
            .map(|&s| {
                let scaled = WAVEFORM_MIDPOINT * (1.0 + s.clamp(-1.0, 1.0));
                scaled.round().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

/// Normalized amplitude (1.0 for a full-scale sine at `freq`) via Goertzel.
fn goertzel_amplitude(samples: &[f32], sample_rate: u32, freq: f32) -> f32 {
    if samples.is_empty() || sample_rate == 0 {
        return 0.0;
    }
    let omega = 2.0 * PI * freq / sample_rate as f32;
    let coeff = 2.0 * omega.cos();
    let mut s_prev = 0.0f32;
    let mut s_prev2 = 0.0f32;
    for &sample in samples {
        let s = sample + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }
    let power = s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2;
    // Goertzel power for a sine of amplitude A over N samples is (A*N/2)^2.
    (2.0 * power.max(0.0).sqrt()) / samples.len() as f32
}

fn amplitude_to_byte(amplitude: f32) -> u8 {
    let db = 20.0 * amplitude.max(1e-10).log10();
    let scaled = (db - SPECTRUM_MIN_DB) / (SPECTRUM_MAX_DB - SPECTRUM_MIN_DB) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

/// Lock-free cell publishing the current byte-scale level to UI readers.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(0.0f32.to_bits())),
        }
    }

    pub fn set_level(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_meter_defaults_to_zero() {
        let meter = LiveMeter::new();
        assert_eq!(meter.level(), 0.0);
    }

    #[test]
    fn live_meter_updates_level() {
        let meter = LiveMeter::new();
        meter.set_level(42.5);
        assert_eq!(meter.level(), 42.5);
    }

    #[test]
    fn spectrum_mean_handles_empty() {
        assert_eq!(spectrum_mean(&[]), 0.0);
    }

    #[test]
    fn waveform_rms_handles_empty() {
        assert_eq!(waveform_rms(&[]), 0.0);
    }
}

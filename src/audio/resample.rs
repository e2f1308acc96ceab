//! Sample-rate conversion from whatever the device delivers down to the
//! 16 kHz mono stream the rest of the pipeline works in.

use super::TARGET_RATE;
use std::f32::consts::PI;

// Practical device-rate bounds (~0.01x .. 8x of the 16 kHz target).
pub(super) const MIN_DEVICE_RATE: u32 = 2_000;
pub(super) const MAX_DEVICE_RATE: u32 = 1_600_000;
const MAX_FIR_TAPS: usize = 129;

/// Convert one chunk of mono samples from `device_rate` to the target rate.
///
/// Downsampling runs a short FIR low-pass first so 44.1/48 kHz content does
/// not alias into the speech band; the interpolation itself is linear, which
/// is plenty for tick-sized speech chunks.
pub fn resample_to_target(input: &[f32], device_rate: u32) -> Vec<f32> {
    if input.is_empty() || device_rate == 0 || device_rate == TARGET_RATE {
        return input.to_vec();
    }
    if !(MIN_DEVICE_RATE..=MAX_DEVICE_RATE).contains(&device_rate) {
        return input.to_vec();
    }

    let ratio = TARGET_RATE as f32 / device_rate as f32;
    if device_rate > TARGET_RATE {
        let filtered = anti_alias(input, device_rate);
        linear_resample(&filtered, ratio)
    } else {
        linear_resample(input, ratio)
    }
}

/// Linear interpolation at a fixed input/output ratio.
pub(super) fn linear_resample(input: &[f32], ratio: f32) -> Vec<f32> {
    let output_len = (input.len() as f32 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let pos = i as f32 / ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f32;
        let sample = match (input.get(idx), input.get(idx + 1)) {
            (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
            _ => input.last().copied().unwrap_or(0.0),
        };
        output.push(sample);
    }
    output
}

fn anti_alias(input: &[f32], device_rate: u32) -> Vec<f32> {
    let taps = fir_tap_count(device_rate);
    if taps <= 1 {
        return input.to_vec();
    }
    let cutoff = (TARGET_RATE as f32 * 0.5 / device_rate as f32).min(0.499);
    let coeffs = windowed_sinc(cutoff, taps);
    let half = (taps / 2) as isize;
    let len = input.len() as isize;
    let mut output = Vec::with_capacity(input.len());
    for n in 0..len {
        let mut acc = 0.0;
        for (k, coeff) in coeffs.iter().enumerate() {
            let idx = n + k as isize - half;
            if (0..len).contains(&idx) {
                acc += input[idx as usize] * coeff;
            }
        }
        output.push(acc);
    }
    output
}

/// Longer filters for harsher decimation. The `| 1` keeps the count odd so
/// the filter stays symmetric around its center tap.
pub(super) fn fir_tap_count(device_rate: u32) -> usize {
    let decimation = device_rate as f32 / TARGET_RATE as f32;
    let taps = (decimation * 4.0).ceil().max(11.0) as usize;
    (taps | 1).min(MAX_FIR_TAPS)
}

/// Hamming-windowed sinc taps, normalized to unity gain at DC.
pub(super) fn windowed_sinc(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let m = (taps - 1) as f32;
    let mut coeffs: Vec<f32> = (0..taps)
        .map(|n| {
            let centered = n as f32 - m / 2.0;
            sinc_gain(normalized_cutoff, centered) * hamming(n as f32, m)
        })
        .collect();
    let gain: f32 = coeffs.iter().sum();
    if gain != 0.0 {
        for coeff in &mut coeffs {
            *coeff /= gain;
        }
    }
    coeffs
}

/// One tap of the 2*cutoff*sinc(2*pi*cutoff*t) prototype filter.
fn sinc_gain(cutoff: f32, centered: f32) -> f32 {
    if centered == 0.0 {
        return 2.0 * cutoff;
    }
    let x = 2.0 * PI * cutoff * centered;
    2.0 * cutoff * x.sin() / x
}

fn hamming(n: f32, m: f32) -> f32 {
    if m <= 0.0 {
        return 1.0;
    }
    0.54 - 0.46 * (2.0 * PI * n / m).cos()
}

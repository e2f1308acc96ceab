//! Capture-source discovery and CPAL stream plumbing.
//!
//! Every source is normalized at the callback: samples become f32, channels
//! are averaged down to mono, and the mono frames go over a bounded channel
//! to the mixer. The stream handle itself is not `Send`, so sources are
//! opened and held on the thread that runs the session tick loop.

use super::mixer::SourceKind;
use crate::log_debug;
use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Substrings that mark an input device as a system-audio loopback.
const LOOPBACK_HINTS: &[&str] = &[
    "monitor",
    "loopback",
    "blackhole",
    "stereo mix",
    "what u hear",
    "soundflower",
    "virtual",
];

/// Names of every capture device the host exposes, for --list-input-devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = input_devices(&host)?;
    Ok(devices
        .into_iter()
        .filter_map(|device| device.name().ok())
        .collect())
}

/// List input devices that look like system-audio loopbacks.
pub fn list_system_sources() -> Result<Vec<String>> {
    Ok(list_input_devices()?
        .into_iter()
        .filter(|name| looks_like_loopback(name))
        .collect())
}

fn looks_like_loopback(name: &str) -> bool {
    let lowered = name.to_lowercase();
    LOOPBACK_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// The mixer-facing end of an open source: its mono frame channel plus the
/// native rate those frames arrive at.
pub struct SourceFeed {
    pub kind: SourceKind,
    pub device_rate: u32,
    pub frames: Receiver<Vec<f32>>,
    pub dropped: Arc<AtomicUsize>,
}

/// An open capture stream. Holds the CPAL stream alive; dropping it stops
/// the callbacks.
pub struct CaptureSource {
    kind: SourceKind,
    name: String,
    stream: cpal::Stream,
}

impl CaptureSource {
    /// Open a source of the given kind and start it.
    ///
    /// `preferred` selects a device by exact name. Without it the mic falls
    /// back to the default input and the system class to the first device
    /// that looks like a loopback.
    pub fn open(
        kind: SourceKind,
        preferred: Option<&str>,
        channel_capacity: usize,
    ) -> Result<(Self, SourceFeed)> {
        let device = find_device(kind, preferred)?;
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown device".to_string());
        let default_config = device
            .default_input_config()
            .with_context(|| format!("no input config for '{name}'"))?;
        let sample_format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let device_rate = device_config.sample_rate.0;
        let channels = device_config.channels.max(1) as usize;

        log_debug(&format!(
            "source open: kind={} device='{name}' format={sample_format:?} rate={device_rate}Hz channels={channels}",
            kind.label()
        ));

        let (tx, rx) = bounded::<Vec<f32>>(channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let label = kind.label();
        let err_fn = move |err| log_debug(&format!("audio_stream_error[{label}]: {err}"));

        // Every supported sample type funnels through the same mono f32
        // callback so everything downstream is format-agnostic.
        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &device_config,
                mono_callback(tx, dropped.clone(), channels, |sample: f32| sample),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &device_config,
                mono_callback(tx, dropped.clone(), channels, |sample: i16| {
                    f32::from(sample) / 32_768.0
                }),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_input_stream(
                &device_config,
                mono_callback(tx, dropped.clone(), channels, |sample: u16| {
                    (f32::from(sample) - 32_768.0) / 32_768.0
                }),
                err_fn,
                None,
            )?,
            other => bail!("unsupported sample format: {other:?}"),
        };

        stream
            .play()
            .with_context(|| format!("failed to start capture on '{name}'"))?;

        let feed = SourceFeed {
            kind,
            device_rate,
            frames: rx,
            dropped,
        };
        Ok((Self { kind, name, stream }, feed))
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop callbacks before the stream is dropped.
    pub fn pause(&self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!(
                "failed to pause {} capture: {err}",
                self.kind.label()
            ));
        }
    }
}

/// Build a capture callback that downmixes to mono and forwards chunks,
/// counting the chunks the mixer was too slow to take.
fn mono_callback<T>(
    tx: Sender<Vec<f32>>,
    lost: Arc<AtomicUsize>,
    channels: usize,
    convert: impl Fn(T) -> f32 + Send + 'static,
) -> impl FnMut(&[T], &cpal::InputCallbackInfo) + Send + 'static
where
    T: Copy + Send + 'static,
{
    move |data, _| {
        let mono = downmix_frames(data, channels, &convert);
        if tx.try_send(mono).is_err() {
            lost.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn find_device(kind: SourceKind, preferred: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(wanted) = preferred {
        return input_devices(&host)?
            .into_iter()
            .find(|device| matches!(device.name().as_deref(), Ok(name) if name == wanted))
            .ok_or_else(|| anyhow!("input device '{wanted}' not found"));
    }
    match kind {
        SourceKind::Mic => host.default_input_device().ok_or_else(|| {
            anyhow!(
                "no default input device available; check microphone permissions. {}",
                capture_permission_hint()
            )
        }),
        SourceKind::System => input_devices(&host)?
            .into_iter()
            .find(|device| {
                matches!(device.name().as_deref(), Ok(name) if looks_like_loopback(name))
            })
            .ok_or_else(|| {
                anyhow!(
                    "no system-audio loopback found; create one (PipeWire/Pulse monitor, \
                     BlackHole, Stereo Mix) or pass its name with --system-source"
                )
            }),
    }
}

fn input_devices(host: &cpal::Host) -> Result<Vec<cpal::Device>> {
    let devices = host
        .input_devices()
        .context("could not enumerate input devices")?;
    Ok(devices.collect())
}

fn capture_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "On macOS, enable your terminal under System Settings > Privacy & Security > Microphone."
    }
    #[cfg(target_os = "linux")]
    {
        "On Linux, verify the PipeWire/PulseAudio input exists and is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "On Windows, allow microphone access under Settings > Privacy & Security > Microphone."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check the OS microphone permission settings."
    }
}

/// Average interleaved channels down to mono while converting to f32.
fn downmix_frames<T: Copy>(data: &[T], channels: usize, convert: impl Fn(T) -> f32) -> Vec<f32> {
    if channels < 2 {
        return data.iter().map(|&sample| convert(sample)).collect();
    }
    let mut mono = Vec::with_capacity(data.len() / channels + 1);
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().map(|&sample| convert(sample)).sum();
        mono.push(sum / frame.len() as f32);
    }
    mono
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_interleaved_channels() {
        let stereo = [0.2f32, 0.4, -0.6, -0.2];
        let mono = downmix_frames(&stereo, 2, |s| s);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn downmix_converts_with_single_channel() {
        let raw = [16_384i16, -16_384];
        let mono = downmix_frames(&raw, 1, |s| f32::from(s) / 32_768.0);
        assert!((mono[0] - 0.5).abs() < 1e-6);
        assert!((mono[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn loopback_heuristic_matches_common_names() {
        assert!(looks_like_loopback(
            "Monitor of Built-in Audio Analog Stereo"
        ));
        assert!(looks_like_loopback("BlackHole 2ch"));
        assert!(looks_like_loopback("Stereo Mix (Realtek Audio)"));
        assert!(!looks_like_loopback("MacBook Pro Microphone"));
    }
}

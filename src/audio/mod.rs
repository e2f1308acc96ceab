//! Dual-source audio capture and voice-activity segmentation.
//!
//! Microphone and system audio are captured via CPAL, mixed into one
//! recordable 16kHz mono stream, and watched by a threshold VAD that adapts
//! to the ambient noise floor. Finished speech segments come out as WAV
//! bytes ready for the transcriber.

/// Target sample rate for segment audio handed to the transcriber.
pub const TARGET_RATE: u32 = 16_000;

/// Target channel count for segment audio.
pub const TARGET_CHANNELS: u16 = 1;

/// Midpoint of the byte-scale waveform domain (unsigned 8-bit audio).
pub const WAVEFORM_MIDPOINT: f32 = 128.0;

mod floor;
mod meter;
mod mixer;
mod resample;
mod segment;
mod sources;
mod vad;

pub use floor::NoiseFloor;
pub use meter::{measure_level, spectrum_mean, waveform_rms, LiveMeter, SourceAnalysis};
pub use mixer::{MixTick, MixerGraph, SourceKind, SourceStrip};
pub use segment::{
    EmittedSegment, SegmentClose, SegmentEnd, SegmentMetrics, SegmentRecorder,
};
pub use sources::{list_input_devices, list_system_sources, CaptureSource, SourceFeed};
pub use vad::{
    SpeechOutcome, SpeechVerdict, ThresholdProfile, TickEvent, VadConfig, VadMachine, VadState,
};

//! Command-line parsing and validation helpers.

mod defaults;
mod settings;
#[cfg(test)]
mod tests;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_MIC_BASE_THRESHOLD, DEFAULT_MIC_NOISE_MARGIN,
    DEFAULT_MIN_SEGMENT_BYTES, DEFAULT_MIN_SPEECH_MS, DEFAULT_NOISE_WINDOW, DEFAULT_PRE_ROLL_MS,
    DEFAULT_QUEUE_DEPTH, DEFAULT_SILENCE_HOLD_MS, DEFAULT_SYSTEM_BASE_THRESHOLD,
    DEFAULT_SYSTEM_NOISE_MARGIN, DEFAULT_TICK_MS, DEFAULT_WHISPER_CMD,
};
pub use settings::Settings;

use crate::answer::{ProviderKind, ResponseSize};
use defaults::{DEFAULT_GAIN, DEFAULT_LANG};

/// CLI options for the voxcoach assistant. Validated values keep downstream
/// subprocesses and device selection safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Voice-activated interview assistant", author, version)]
pub struct AppConfig {
    /// Audio sources to capture
    #[arg(long, value_enum, default_value_t = SourceChoice::Mic)]
    pub capture: SourceChoice,

    /// Preferred microphone device name (exact match)
    #[arg(long)]
    pub input_device: Option<String>,

    /// System-audio source id as printed by --list-sources
    #[arg(long = "system-source")]
    pub system_source: Option<String>,

    /// Print detected microphone devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected system-audio (loopback) sources and exit
    #[arg(long = "list-sources", default_value_t = false)]
    pub list_sources: bool,

    /// Microphone gain applied before mixing
    #[arg(long = "mic-gain", default_value_t = DEFAULT_GAIN)]
    pub mic_gain: f32,

    /// System-audio gain applied before mixing
    #[arg(long = "system-gain", default_value_t = DEFAULT_GAIN)]
    pub system_gain: f32,

    /// Monitoring tick interval (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Trailing silence required before a segment closes (milliseconds)
    #[arg(long = "silence-hold-ms", default_value_t = DEFAULT_SILENCE_HOLD_MS)]
    pub silence_hold_ms: u64,

    /// Minimum speech duration for a segment to be kept (milliseconds)
    #[arg(long = "min-speech-ms", default_value_t = DEFAULT_MIN_SPEECH_MS)]
    pub min_speech_ms: u64,

    /// Noise-floor window length (ticks)
    #[arg(long = "noise-window", default_value_t = DEFAULT_NOISE_WINDOW)]
    pub noise_window: usize,

    /// Audio retained ahead of each speech onset (milliseconds, 0 disables)
    #[arg(long = "pre-roll-ms", default_value_t = DEFAULT_PRE_ROLL_MS)]
    pub pre_roll_ms: u64,

    /// Minimum encoded segment size worth transcribing (bytes)
    #[arg(long = "min-segment-bytes", default_value_t = DEFAULT_MIN_SEGMENT_BYTES)]
    pub min_segment_bytes: usize,

    /// Microphone speech threshold (byte loudness)
    #[arg(long = "mic-base-threshold", default_value_t = DEFAULT_MIC_BASE_THRESHOLD)]
    pub mic_base_threshold: f32,

    /// Margin added to the noise floor for the microphone
    #[arg(long = "mic-noise-margin", default_value_t = DEFAULT_MIC_NOISE_MARGIN)]
    pub mic_noise_margin: f32,

    /// System-audio speech threshold (byte loudness)
    #[arg(
        long = "system-base-threshold",
        default_value_t = DEFAULT_SYSTEM_BASE_THRESHOLD
    )]
    pub system_base_threshold: f32,

    /// Margin added to the noise floor for system audio
    #[arg(
        long = "system-noise-margin",
        default_value_t = DEFAULT_SYSTEM_NOISE_MARGIN
    )]
    pub system_noise_margin: f32,

    /// Frame channel capacity between capture callbacks and the mixer
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Emitted-segment queue depth between monitor and forwarding worker
    #[arg(long = "queue-depth", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Path to the whisper.cpp CLI binary
    #[arg(long = "whisper-cmd", default_value = DEFAULT_WHISPER_CMD)]
    pub whisper_cmd: String,

    /// Path to a ggml whisper model (auto-discovered from whisper_models/ if omitted)
    #[arg(long = "whisper-model")]
    pub whisper_model: Option<String>,

    /// Extra arguments appended to the whisper command (shell-quoted)
    #[arg(long = "whisper-args", default_value = "")]
    pub whisper_args: String,

    /// Language passed to whisper
    #[arg(long, default_value = DEFAULT_LANG)]
    pub lang: String,

    /// Answer provider (defaults to openai)
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model override for the answer provider
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature forwarded to the answer provider
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Requested answer length (defaults to medium)
    #[arg(long = "response-size", value_enum)]
    pub response_size: Option<ResponseSize>,

    /// Transcribe only; never call the answer provider
    #[arg(long = "no-auto-answer", default_value_t = false)]
    pub no_auto_answer: bool,

    /// OpenAI API key
    #[arg(long = "openai-api-key", env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Gemini API key
    #[arg(long = "gemini-api-key", env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// YAML settings file merged beneath CLI flags
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Write the debug log file
    #[arg(long = "logs", env = "VOXCOACH_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Suppress every log file (wins over --logs and the log env vars)
    #[arg(long = "no-logs", env = "VOXCOACH_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow transcript/answer snippets in the debug log
    #[arg(
        long = "log-content",
        env = "VOXCOACH_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,

    /// Log per-phase timings for each segment
    #[arg(long)]
    pub log_timings: bool,
}

/// Tunable parameters for one capture + dispatch session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture: SourceChoice,
    pub input_device: Option<String>,
    pub system_source: Option<String>,
    pub mic_gain: f32,
    pub system_gain: f32,
    pub tick_ms: u64,
    pub silence_hold_ms: u64,
    pub min_speech_ms: u64,
    pub noise_window: usize,
    pub pre_roll_ms: u64,
    pub min_segment_bytes: usize,
    pub mic_base_threshold: f32,
    pub mic_noise_margin: f32,
    pub system_base_threshold: f32,
    pub system_noise_margin: f32,
    pub channel_capacity: usize,
    pub queue_depth: usize,
    pub auto_answer: bool,
    pub response_size: ResponseSize,
    pub answer_model: Option<String>,
    pub temperature: Option<f64>,
    pub log_timings: bool,
}

/// Which audio sources a session captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceChoice {
    Mic,
    System,
    Both,
}

impl SourceChoice {
    pub fn label(self) -> &'static str {
        match self {
            SourceChoice::Mic => "mic",
            SourceChoice::System => "system",
            SourceChoice::Both => "both",
        }
    }

    pub fn wants_mic(self) -> bool {
        matches!(self, SourceChoice::Mic | SourceChoice::Both)
    }

    pub fn wants_system(self) -> bool {
        matches!(self, SourceChoice::System | SourceChoice::Both)
    }
}

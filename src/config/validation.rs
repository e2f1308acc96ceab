use super::defaults::{
    ISO_639_1_CODES, MAX_CHANNEL_CAPACITY, MAX_GAIN, MAX_LEVEL_BYTE, MAX_MIN_SEGMENT_BYTES,
    MAX_MIN_SPEECH_MS, MAX_NOISE_WINDOW, MAX_PRE_ROLL_MS, MAX_QUEUE_DEPTH, MAX_SILENCE_HOLD_MS,
    MAX_TEMPERATURE, MAX_TICK_MS, MAX_WHISPER_ARG_BYTES, MAX_WHISPER_EXTRA_ARGS,
    MIN_CHANNEL_CAPACITY, MIN_MIN_SPEECH_MS, MIN_SILENCE_HOLD_MS, MIN_TICK_MS, WHISPER_MODEL_DIR,
};
use super::settings::Settings;
use super::{AppConfig, SessionConfig};
use crate::answer::{ProviderKind, ResponseSize};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

impl AppConfig {
    /// Parse CLI arguments, merge the settings file, and validate right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        if let Some(path) = config.settings.clone() {
            Settings::load(&path)?.apply(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Answer provider with the default applied.
    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.unwrap_or(ProviderKind::OpenAi)
    }

    /// Requested answer length with the default applied.
    pub fn answer_size(&self) -> ResponseSize {
        self.response_size.unwrap_or(ResponseSize::Medium)
    }

    /// API key for the selected provider, if one was supplied.
    pub fn provider_api_key(&self) -> Option<&str> {
        match self.provider_kind() {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
        }
    }

    /// Whether the debug and telemetry files should be written at all.
    /// `--no-logs` wins over every other flag.
    pub fn file_logging_enabled(&self) -> bool {
        (self.logs || self.log_timings) && !self.no_logs
    }

    /// Check CLI values and normalize paths.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_TICK_MS..=MAX_TICK_MS).contains(&self.tick_ms) {
            bail!(
                "--tick-ms must be between {MIN_TICK_MS} and {MAX_TICK_MS}, got {}",
                self.tick_ms
            );
        }
        if !(MIN_SILENCE_HOLD_MS..=MAX_SILENCE_HOLD_MS).contains(&self.silence_hold_ms) {
            bail!(
                "--silence-hold-ms must be between {MIN_SILENCE_HOLD_MS} and {MAX_SILENCE_HOLD_MS}, got {}",
                self.silence_hold_ms
            );
        }
        if !(MIN_MIN_SPEECH_MS..=MAX_MIN_SPEECH_MS).contains(&self.min_speech_ms) {
            bail!(
                "--min-speech-ms must be between {MIN_MIN_SPEECH_MS} and {MAX_MIN_SPEECH_MS}, got {}",
                self.min_speech_ms
            );
        }
        if self.noise_window == 0 || self.noise_window > MAX_NOISE_WINDOW {
            bail!(
                "--noise-window must be between 1 and {MAX_NOISE_WINDOW}, got {}",
                self.noise_window
            );
        }
        if self.pre_roll_ms > MAX_PRE_ROLL_MS {
            bail!(
                "--pre-roll-ms must be at most {MAX_PRE_ROLL_MS}, got {}",
                self.pre_roll_ms
            );
        }
        if self.min_segment_bytes > MAX_MIN_SEGMENT_BYTES {
            bail!(
                "--min-segment-bytes must be at most {MAX_MIN_SEGMENT_BYTES}, got {}",
                self.min_segment_bytes
            );
        }
        for (flag, value) in [
            ("--mic-base-threshold", self.mic_base_threshold),
            ("--mic-noise-margin", self.mic_noise_margin),
            ("--system-base-threshold", self.system_base_threshold),
            ("--system-noise-margin", self.system_noise_margin),
        ] {
            if !(0.0..=MAX_LEVEL_BYTE).contains(&value) {
                bail!("{flag} must be between 0 and {MAX_LEVEL_BYTE}, got {value}");
            }
        }
        for (flag, value) in [
            ("--mic-gain", self.mic_gain),
            ("--system-gain", self.system_gain),
        ] {
            if !(0.0..=MAX_GAIN).contains(&value) {
                bail!("{flag} must be between 0.0 and {MAX_GAIN}, got {value}");
            }
        }
        if !(MIN_CHANNEL_CAPACITY..=MAX_CHANNEL_CAPACITY).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between {MIN_CHANNEL_CAPACITY} and {MAX_CHANNEL_CAPACITY}, got {}",
                self.channel_capacity
            );
        }
        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            bail!(
                "--queue-depth must be between 1 and {MAX_QUEUE_DEPTH}, got {}",
                self.queue_depth
            );
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
                bail!("--temperature must be between 0.0 and {MAX_TEMPERATURE}, got {temperature}");
            }
        }

        self.whisper_cmd = sanitize_binary(
            &self.whisper_cmd,
            "--whisper-cmd",
            &["whisper-cli", "whisper-cpp", "whisper", "main"],
        )?;

        let extra_args = shell_words::split(&self.whisper_args)
            .map_err(|err| anyhow!("--whisper-args is not valid shell quoting: {err}"))?;
        if extra_args.len() > MAX_WHISPER_EXTRA_ARGS {
            bail!(
                "--whisper-args holds too many arguments (max {MAX_WHISPER_EXTRA_ARGS}, got {})",
                extra_args.len()
            );
        }
        let arg_bytes: usize = extra_args.iter().map(|arg| arg.len()).sum();
        if arg_bytes > MAX_WHISPER_ARG_BYTES {
            bail!("--whisper-args total length exceeds {MAX_WHISPER_ARG_BYTES} bytes");
        }

        if self.whisper_model.is_none() {
            self.whisper_model =
                discover_default_whisper_model().map(|path| path.to_string_lossy().into_owned());
        }
        // Whether supplied or auto-detected, hand the subprocess an absolute path.
        if let Some(model) = self.whisper_model.take() {
            self.whisper_model = Some(resolve_model_path(&model)?);
        }

        validate_lang(&self.lang)?;

        if let Some(device) = &self.input_device {
            validate_device_name(device, "--input-device")?;
        }
        if let Some(source) = &self.system_source {
            validate_device_name(source, "--system-source")?;
        }

        // Answer generation needs a key up front; transcribe-only and the
        // list modes do not.
        if !self.no_auto_answer && !self.list_sources && !self.list_input_devices {
            let (key, flag, env_var) = match self.provider_kind() {
                ProviderKind::OpenAi => (&self.openai_api_key, "--openai-api-key", "OPENAI_API_KEY"),
                ProviderKind::Gemini => (&self.gemini_api_key, "--gemini-api-key", "GEMINI_API_KEY"),
            };
            if key.is_none() {
                bail!(
                    "{} answers need {flag} (or {env_var}); pass --no-auto-answer to transcribe only",
                    self.provider_kind().label()
                );
            }
        }

        Ok(())
    }

    /// Snapshot the validated CLI settings for one session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            capture: self.capture,
            input_device: self.input_device.clone(),
            system_source: self.system_source.clone(),
            mic_gain: self.mic_gain,
            system_gain: self.system_gain,
            tick_ms: self.tick_ms,
            silence_hold_ms: self.silence_hold_ms,
            min_speech_ms: self.min_speech_ms,
            noise_window: self.noise_window,
            pre_roll_ms: self.pre_roll_ms,
            min_segment_bytes: self.min_segment_bytes,
            mic_base_threshold: self.mic_base_threshold,
            mic_noise_margin: self.mic_noise_margin,
            system_base_threshold: self.system_base_threshold,
            system_noise_margin: self.system_noise_margin,
            channel_capacity: self.channel_capacity,
            queue_depth: self.queue_depth,
            auto_answer: !self.no_auto_answer,
            response_size: self.answer_size(),
            answer_model: self.model.clone(),
            temperature: self.temperature,
            log_timings: self.log_timings,
        }
    }
}

/// Device names only feed cpal name matching, so just keep them printable
/// and bounded.
fn validate_device_name(value: &str, flag: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{flag} must not be empty");
    }
    if value.len() > 256 || value.chars().any(|ch| ch.is_control()) {
        bail!("{flag} must be <=256 characters with no control characters");
    }
    Ok(())
}

/// "auto" defers language detection to whisper. Anything else must look
/// like a locale tag whose leading subtag is a known ISO-639-1 code.
fn validate_lang(lang: &str) -> Result<()> {
    if lang.trim().is_empty() {
        bail!("--lang must not be empty");
    }
    if lang.eq_ignore_ascii_case("auto") {
        return Ok(());
    }
    if lang
        .chars()
        .any(|ch| !ch.is_ascii_alphabetic() && ch != '-' && ch != '_')
    {
        bail!("--lang must contain only alphabetic characters or '-'/'_' separators");
    }
    // Locale-style tags like en-US pass as long as the leading subtag is real.
    let primary = lang.split(['-', '_']).next().unwrap_or_default();
    if !ISO_639_1_CODES
        .iter()
        .any(|code| code.eq_ignore_ascii_case(primary))
    {
        bail!("--lang must start with a valid ISO-639-1 code or be 'auto', got '{lang}'");
    }
    Ok(())
}

/// Resolve the model argument to a canonical absolute UTF-8 path.
fn resolve_model_path(model: &str) -> Result<String> {
    let path = Path::new(model);
    if !path.exists() {
        bail!("whisper model path '{}' does not exist", path.display());
    }
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to canonicalize whisper model path '{model}'"))?;
    canonical
        .into_os_string()
        .into_string()
        .map_err(|_| anyhow!("whisper model path must be valid UTF-8"))
}

/// Look for a ggml model under `whisper_models/` in the working directory
/// so transcription works out of the box without --whisper-model.
pub(super) fn discover_default_whisper_model() -> Option<PathBuf> {
    let models_dir = env::current_dir().ok()?.join(WHISPER_MODEL_DIR);
    [
        "ggml-base.en.bin",
        "ggml-base.bin",
        "ggml-small.en.bin",
        "ggml-small.bin",
    ]
    .into_iter()
    .map(|name| models_dir.join(name))
    .find(|candidate| candidate.exists())
    .and_then(|found| found.canonicalize().ok())
}

/// Allow either a known binary name or an existing executable path.
pub(super) fn sanitize_binary(value: &str, flag: &str, allowlist: &[&str]) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{flag} cannot be empty");
    }
    for allowed in allowlist {
        if allowed.eq_ignore_ascii_case(trimmed) {
            return Ok((*allowed).to_string());
        }
    }
    let looks_like_path =
        trimmed.contains(std::path::MAIN_SEPARATOR) || Path::new(trimmed).is_absolute();
    if !looks_like_path {
        bail!("{flag} must be one of {allowlist:?} or an existing binary path");
    }
    resolve_binary_path(trimmed, flag)
}

/// Binary paths are canonicalized and must land on an executable regular file.
fn resolve_binary_path(trimmed: &str, flag: &str) -> Result<String> {
    let canonical = Path::new(trimmed)
        .canonicalize()
        .with_context(|| format!("failed to canonicalize {flag} '{trimmed}'"))?;
    let metadata = fs::metadata(&canonical)
        .with_context(|| format!("failed to inspect {flag} '{}'", canonical.display()))?;
    if !metadata.is_file() {
        bail!("{flag} '{}' is not a file", canonical.display());
    }
    if !is_executable(&metadata) {
        bail!("{flag} '{}' is not executable", canonical.display());
    }
    canonical
        .into_os_string()
        .into_string()
        .map_err(|_| anyhow!("{flag} must resolve to a UTF-8 path"))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

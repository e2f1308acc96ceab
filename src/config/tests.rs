use super::validation::sanitize_binary;
use super::{AppConfig, Settings, SourceChoice};
use crate::answer::{ProviderKind, ResponseSize};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{env, fs, process};

/// Parse test args with answer generation disabled so validation does not
/// depend on API keys in the environment.
fn transcribe_only(extra: &[&str]) -> AppConfig {
    let mut args = vec!["test-app", "--no-auto-answer"];
    args.extend_from_slice(extra);
    AppConfig::parse_from(args)
}

fn write_settings(content: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let path = env::temp_dir().join(format!(
        "voxcoach_settings_{}_{}.yaml",
        process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn accepts_transcribe_only_defaults() {
    let mut cfg = transcribe_only(&[]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_tick_out_of_bounds() {
    let mut cfg = transcribe_only(&["--tick-ms", "10"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--tick-ms", "2000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_tick_bounds() {
    let mut cfg = transcribe_only(&["--tick-ms", "20"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = transcribe_only(&["--tick-ms", "1000"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_silence_hold_out_of_bounds() {
    let mut cfg = transcribe_only(&["--silence-hold-ms", "100"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--silence-hold-ms", "40000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_min_speech_out_of_bounds() {
    let mut cfg = transcribe_only(&["--min-speech-ms", "10"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--min-speech-ms", "20000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_noise_window_out_of_bounds() {
    let mut cfg = transcribe_only(&["--noise-window", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--noise-window", "2000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn pre_roll_can_be_disabled_but_not_unbounded() {
    let mut cfg = transcribe_only(&["--pre-roll-ms", "0"]);
    assert!(cfg.validate().is_ok());

    let mut cfg = transcribe_only(&["--pre-roll-ms", "6000"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_thresholds_outside_byte_scale() {
    let mut cfg = transcribe_only(&["--mic-base-threshold", "300"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--system-noise-margin=-1"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_gain_out_of_range() {
    let mut cfg = transcribe_only(&["--mic-gain", "5"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--system-gain=-0.5"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_channel_capacity_out_of_bounds() {
    let mut cfg = transcribe_only(&["--channel-capacity", "4"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--channel-capacity", "2048"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_queue_depth_out_of_bounds() {
    let mut cfg = transcribe_only(&["--queue-depth", "0"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--queue-depth", "65"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_temperature_out_of_range() {
    let mut cfg = transcribe_only(&["--temperature=-0.1"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--temperature", "2.5"]);
    assert!(cfg.validate().is_err());

    let mut cfg = transcribe_only(&["--temperature", "1.0"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_invalid_language_code() {
    let mut cfg = transcribe_only(&["--lang", "en$"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_language_with_unknown_primary_code() {
    let mut cfg = transcribe_only(&["--lang", "zz-ZZ"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_language_with_region_suffixes() {
    let mut cfg = transcribe_only(&["--lang", "en-US"]);
    assert!(cfg.validate().is_ok());
    let mut cfg = transcribe_only(&["--lang", "pt_BR"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn accepts_auto_language() {
    let mut cfg = transcribe_only(&["--lang", "auto"]);
    assert!(cfg.validate().is_ok());
}

#[test]
fn rejects_unknown_whisper_cmd() {
    let mut cfg = transcribe_only(&["--whisper-cmd", "not-whisper"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_unbalanced_whisper_args() {
    let mut cfg = transcribe_only(&["--whisper-args", "\"unterminated"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_missing_whisper_model_path() {
    let mut cfg = transcribe_only(&["--whisper-model", "/nonexistent/ggml-tiny.bin"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_device_name_with_control_characters() {
    let mut cfg = transcribe_only(&["--input-device", "bad\nname"]);
    assert!(cfg.validate().is_err());
}

#[test]
fn auto_answer_requires_provider_key() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    cfg.openai_api_key = None;
    assert!(cfg.validate().is_err());

    let mut cfg = AppConfig::parse_from(["test-app", "--provider", "gemini"]);
    cfg.gemini_api_key = None;
    assert!(cfg.validate().is_err());
}

#[test]
fn auto_answer_accepts_matching_key() {
    let mut cfg = AppConfig::parse_from(["test-app"]);
    cfg.openai_api_key = Some("sk-test".into());
    assert!(cfg.validate().is_ok());
}

#[test]
fn list_modes_skip_key_requirement() {
    let mut cfg = AppConfig::parse_from(["test-app", "--list-sources"]);
    cfg.openai_api_key = None;
    assert!(cfg.validate().is_ok());
}

#[test]
fn provider_and_size_defaults() {
    let cfg = AppConfig::parse_from(["test-app"]);
    assert_eq!(cfg.provider_kind(), ProviderKind::OpenAi);
    assert_eq!(cfg.answer_size(), ResponseSize::Medium);
}

#[test]
fn source_choice_labels_and_wants() {
    assert_eq!(SourceChoice::Mic.label(), "mic");
    assert_eq!(SourceChoice::System.label(), "system");
    assert_eq!(SourceChoice::Both.label(), "both");

    assert!(SourceChoice::Mic.wants_mic());
    assert!(!SourceChoice::Mic.wants_system());
    assert!(SourceChoice::Both.wants_mic());
    assert!(SourceChoice::Both.wants_system());
}

#[test]
fn session_config_snapshots_cli_values() {
    let mut cfg = transcribe_only(&[
        "--capture",
        "both",
        "--queue-depth",
        "4",
        "--response-size",
        "large",
        "--model",
        "gpt-4o",
        "--system-gain",
        "0.5",
    ]);
    cfg.validate().unwrap();

    let session = cfg.session_config();
    assert_eq!(session.capture, SourceChoice::Both);
    assert_eq!(session.queue_depth, 4);
    assert_eq!(session.response_size, ResponseSize::Large);
    assert_eq!(session.answer_model.as_deref(), Some("gpt-4o"));
    assert_eq!(session.system_gain, 0.5);
    assert!(!session.auto_answer);
}

#[test]
fn settings_fill_unset_fields() {
    let path = write_settings(
        "provider: gemini\nmodel: my-model\ntemperature: 0.5\ngemini_api_key: g-key\n",
    );
    let settings = Settings::load(&path).unwrap();

    let mut cfg = AppConfig::parse_from(["test-app"]);
    cfg.gemini_api_key = None;
    settings.apply(&mut cfg).unwrap();

    assert_eq!(cfg.provider_kind(), ProviderKind::Gemini);
    assert_eq!(cfg.model.as_deref(), Some("my-model"));
    assert_eq!(cfg.temperature, Some(0.5));
    assert_eq!(cfg.gemini_api_key.as_deref(), Some("g-key"));

    let _ = fs::remove_file(&path);
}

#[test]
fn cli_flags_beat_settings() {
    let path = write_settings("provider: gemini\nmodel: yaml-model\n");
    let settings = Settings::load(&path).unwrap();

    let mut cfg = AppConfig::parse_from(["test-app", "--provider", "openai", "--model", "cli-model"]);
    settings.apply(&mut cfg).unwrap();

    assert_eq!(cfg.provider_kind(), ProviderKind::OpenAi);
    assert_eq!(cfg.model.as_deref(), Some("cli-model"));

    let _ = fs::remove_file(&path);
}

#[test]
fn settings_reject_unknown_provider() {
    let path = write_settings("provider: claude\n");
    let settings = Settings::load(&path).unwrap();

    let mut cfg = AppConfig::parse_from(["test-app"]);
    assert!(settings.apply(&mut cfg).is_err());

    let _ = fs::remove_file(&path);
}

#[test]
fn settings_reject_unknown_fields() {
    let path = write_settings("provider: openai\nfavorite_color: blue\n");
    assert!(Settings::load(&path).is_err());

    let _ = fs::remove_file(&path);
}

#[test]
fn sanitize_binary_normalizes_allowlisted_names() {
    let cleaned = sanitize_binary("WHISPER-CLI", "--whisper-cmd", &["whisper-cli"]).unwrap();
    assert_eq!(cleaned, "whisper-cli");
}

#[test]
fn sanitize_binary_rejects_unknown_relative_names() {
    assert!(sanitize_binary("evil-tool", "--whisper-cmd", &["whisper-cli"]).is_err());
}

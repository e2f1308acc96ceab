//! VoxCoach entrypoint: capture, transcribe, and answer in one session.
//!
//! The session spawns its own monitor and dispatch threads, so main stays a
//! plain read-print loop. A small stdin thread turns typed commands into
//! channel messages and the event loop never blocks on the keyboard.

use anyhow::{bail, Result};
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use voxcoach::answer::create_provider;
use voxcoach::audio::{list_input_devices, list_system_sources};
use voxcoach::config::AppConfig;
use voxcoach::session::{Session, SessionEvent};
use voxcoach::stt::WhisperCli;
use voxcoach::telemetry::init_tracing;
use voxcoach::{init_logging, install_panic_hook, log_debug, log_file_path, ConversationHistory};

enum Command {
    Stop,
    ClearHistory,
}

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;

    if config.list_input_devices {
        return print_devices("input devices", &list_input_devices()?);
    }
    if config.list_sources {
        let sources = list_system_sources()?;
        if sources.is_empty() {
            println!("no loopback-style sources found; pass --system-source to pick one by name");
            return Ok(());
        }
        return print_devices("system sources", &sources);
    }

    init_logging(&config);
    init_tracing(&config);
    install_panic_hook();
    log_debug("=== VoxCoach session starting ===");
    log_debug(&format!("log file: {:?}", log_file_path()));

    let Some(model) = config.whisper_model.as_deref() else {
        bail!("no whisper model found; pass --whisper-model or put ggml-base.en.bin under whisper_models/");
    };
    let transcriber = WhisperCli::new(
        &config.whisper_cmd,
        Path::new(model),
        &config.lang,
        &config.whisper_args,
    )?;

    let session_config = config.session_config();
    let provider = if session_config.auto_answer {
        let kind = config.provider_kind();
        let Some(key) = config.provider_api_key() else {
            bail!("missing API key for {}", kind.label());
        };
        Some(create_provider(kind, key.to_string()))
    } else {
        None
    };

    let history = ConversationHistory::new();
    let mut session = Session::start(
        session_config,
        Box::new(transcriber),
        provider,
        history.clone(),
    )?;

    println!("voxcoach v{}", env!("CARGO_PKG_VERSION"));
    println!("speak when ready; press Enter to stop, type :clear to reset the conversation");

    let commands = spawn_stdin_reader();
    loop {
        match session.events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if !print_event(event) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        match commands.try_recv() {
            Ok(Command::Stop) => session.request_stop(),
            Ok(Command::ClearHistory) => {
                history.clear();
                println!("(history cleared)");
            }
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => session.request_stop(),
        }
    }
    session.stop();
    println!("session ended");
    Ok(())
}

/// Render one session event; returns false once the session reports Stopped.
fn print_event(event: SessionEvent) -> bool {
    match event {
        SessionEvent::StateChanged(state) => println!("[{}]", state.label()),
        SessionEvent::SourceDropped { kind, error } => {
            eprintln!("warning: {} source unavailable: {error}", kind.label());
        }
        SessionEvent::SegmentQueued { duration_ms, .. } => {
            println!("(captured {:.1}s of speech)", duration_ms as f64 / 1000.0);
        }
        SessionEvent::Transcript { text, .. } => println!("You: {text}"),
        SessionEvent::NoSpeech { .. } => {}
        SessionEvent::Answer { text, .. } => println!("Coach: {text}\n"),
        SessionEvent::Error(message) => eprintln!("error: {message}"),
        SessionEvent::Stopped => return false,
    }
    true
}

/// Read stdin lines on a side thread; an empty line stops the session and
/// `:clear` wipes the conversation history.
fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let trimmed = line.trim();
            let command = if trimmed.is_empty() {
                Command::Stop
            } else if trimmed.eq_ignore_ascii_case(":clear") {
                Command::ClearHistory
            } else {
                continue;
            };
            let stop = matches!(command, Command::Stop);
            if tx.send(command).is_err() || stop {
                return;
            }
        }
        let _ = tx.send(Command::Stop);
    });
    rx
}

fn print_devices(label: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        println!("no {label} found");
        return Ok(());
    }
    println!("{label}:");
    for name in names {
        println!("  {name}");
    }
    Ok(())
}

//! Opt-in JSON telemetry stream for timing analysis.
//!
//! Shares the debug-log gate from the CLI flags and writes structured
//! events to its own JSONL file so they stay machine-readable.

use crate::config::AppConfig;
use std::env;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static SUBSCRIBER_GUARD: OnceLock<()> = OnceLock::new();

/// Where structured events land; `VOXCOACH_TRACE_LOG` overrides the default.
pub fn tracing_log_path() -> PathBuf {
    match env::var("VOXCOACH_TRACE_LOG") {
        Ok(path) => PathBuf::from(path),
        Err(_) => env::temp_dir().join("voxcoach_trace.jsonl"),
    }
}

/// Install the global JSON subscriber once per process. When the file cannot
/// be opened the events simply go nowhere.
pub fn init_tracing(config: &AppConfig) {
    if !config.file_logging_enabled() {
        return;
    }
    let _ = SUBSCRIBER_GUARD.get_or_init(|| {
        if let Ok(file) = open_trace_file() {
            install_subscriber(file);
        }
    });
}

fn open_trace_file() -> std::io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(tracing_log_path())
}

fn install_subscriber(file: File) {
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_writer(file)
        .with_current_span(false)
        .with_span_list(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

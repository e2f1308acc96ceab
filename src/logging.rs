//! Rotating debug and crash logs, kept out of the way of session stdout.
//!
//! Two sinks share one implementation: the debug log takes the high-volume
//! pipeline lines, the crash log only ever sees panic summaries. Lines that
//! carry user content (transcripts, answers) stay out of both unless
//! `--log-content` was passed.

use crate::config::AppConfig;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

const DEBUG_LOG_CAP: u64 = 5 * 1024 * 1024;
const CRASH_LOG_CAP: u64 = 256 * 1024;

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static DEBUG_SINK: OnceLock<Mutex<Option<LogSink>>> = OnceLock::new();
static HOOK_GUARD: OnceLock<()> = OnceLock::new();

/// Path of the rotating debug log.
pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join("voxcoach.log")
}

/// Path of the crash log (panic metadata only).
pub fn crash_log_path() -> PathBuf {
    std::env::temp_dir().join("voxcoach_crash.log")
}

/// Size-capped append sink. An append that would cross the cap truncates the
/// file first, so the log never grows past its budget between runs.
struct LogSink {
    path: PathBuf,
    file: File,
    cap: u64,
    written: u64,
}

impl LogSink {
    fn open(path: PathBuf, cap: u64) -> Option<Self> {
        let mut written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if written > cap {
            let _ = fs::remove_file(&path);
            written = 0;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        Some(Self {
            path,
            file,
            cap,
            written,
        })
    }

    fn append(&mut self, msg: &str) {
        let line = format!("[{}] {msg}\n", unix_timestamp());
        if self.written.saturating_add(line.len() as u64) > self.cap && !self.restart() {
            return;
        }
        if self.file.write_all(line.as_bytes()).is_ok() {
            self.written = self.written.saturating_add(line.len() as u64);
        }
    }

    /// Truncate and reopen once the cap is hit.
    fn restart(&mut self) -> bool {
        let reopened = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path);
        match reopened {
            Ok(file) => {
                self.file = file;
                self.written = 0;
                true
            }
            Err(_) => false,
        }
    }
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn debug_sink() -> &'static Mutex<Option<LogSink>> {
    DEBUG_SINK.get_or_init(|| Mutex::new(None))
}

/// Apply the CLI logging flags once at startup.
pub fn init_logging(config: &AppConfig) {
    let enabled = config.file_logging_enabled();
    DEBUG_ENABLED.store(enabled, Ordering::Relaxed);
    CONTENT_ENABLED.store(enabled && config.log_content, Ordering::Relaxed);

    let mut sink = debug_sink()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *sink = if enabled {
        LogSink::open(log_file_path(), DEBUG_LOG_CAP)
    } else {
        None
    };
}

/// Append one line to the debug log, if logging is enabled.
pub fn log_debug(msg: &str) {
    if !DEBUG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let mut sink = debug_sink()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(sink) = sink.as_mut() {
        sink.append(msg);
    }
}

/// Like [`log_debug`] for lines carrying user content.
pub fn log_debug_content(msg: &str) {
    if CONTENT_ENABLED.load(Ordering::Relaxed) {
        log_debug(msg);
    }
}

/// Record a panic in the crash log. The payload is redacted unless content
/// logging was switched on.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    if !DEBUG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let payload = if CONTENT_ENABLED.load(Ordering::Relaxed) {
        panic_payload(info)
    } else {
        "payload omitted (log-content disabled)".to_string()
    };
    if let Some(mut sink) = LogSink::open(crash_log_path(), CRASH_LOG_CAP) {
        sink.append(&format!(
            "panic at {}: {payload} (v{})",
            panic_location(info),
            env!("CARGO_PKG_VERSION")
        ));
    }
}

fn panic_location(info: &panic::PanicHookInfo<'_>) -> String {
    match info.location() {
        Some(loc) => format!("{}:{}", loc.file(), loc.line()),
        None => "unknown".to_string(),
    }
}

fn panic_payload(info: &panic::PanicHookInfo<'_>) -> String {
    let payload = info.payload();
    payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "opaque panic payload".to_string())
}

/// Route panics through the crash log before the default hook runs.
pub fn install_panic_hook() {
    HOOK_GUARD.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            log_debug(&format!("panic at {}", panic_location(info)));
            log_debug_content(&format!("panic: {info}"));
            previous(info);
        }));
    });
}

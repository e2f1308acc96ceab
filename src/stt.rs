//! Speech-to-text through the whisper.cpp command line.
//!
//! Segments arrive as encoded WAV bytes, get parked in a temp file, and go
//! through `whisper-cli` (or any compatible binary). The raw stdout is then
//! scrubbed of timestamps and non-speech artifacts before anyone downstream
//! sees it.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// WAV payloads under this size are refused without spawning whisper.
const MIN_WAV_BYTES: usize = 100;

const NO_SPEECH_TOO_SHORT: &str = "No speech detected - audio too short";
const NO_SPEECH_BLANK: &str =
    "No speech detected - please check your microphone settings and speak clearly";
const NO_SPEECH_EMPTY: &str = "No speech detected";

/// Substrings marking a transcript as unusable for answer generation.
/// Matching is case-sensitive on purpose: these are exact tool outputs,
/// not natural language.
pub const NO_SPEECH_MARKERS: &[&str] = &[
    "No speech detected",
    "[BLANK_AUDIO]",
    "please check your microphone",
    "Error:",
    "Invalid audio format",
    "audio too short",
    "failed to",
];

/// True when a transcript should be dropped instead of answered.
pub fn is_no_speech(transcript: &str) -> bool {
    let trimmed = transcript.trim();
    trimmed.is_empty() || NO_SPEECH_MARKERS.iter().any(|marker| trimmed.contains(marker))
}

/// Turns one segment's WAV bytes into text.
pub trait Transcriber: Send {
    fn name(&self) -> &'static str;
    fn transcribe(&self, wav: &[u8]) -> Result<String>;
}

/// Runs a whisper.cpp-style binary per segment.
pub struct WhisperCli {
    binary: String,
    model: PathBuf,
    lang: String,
    extra_args: Vec<String>,
}

impl WhisperCli {
    pub fn new(binary: &str, model: &Path, lang: &str, extra_args: &str) -> Result<Self> {
        let extra_args = shell_words::split(extra_args)
            .with_context(|| format!("invalid whisper args: '{extra_args}'"))?;
        Ok(Self {
            binary: binary.to_string(),
            model: model.to_path_buf(),
            lang: lang.to_string(),
            extra_args,
        })
    }
}

impl Transcriber for WhisperCli {
    fn name(&self) -> &'static str {
        "whisper-cli"
    }

    fn transcribe(&self, wav: &[u8]) -> Result<String> {
        if wav.len() < MIN_WAV_BYTES {
            return Ok(NO_SPEECH_TOO_SHORT.to_string());
        }
        let temp = TempWav::write(wav)?;
        // Limit CPU usage so laptops don't max out all cores.
        let threads = num_cpus::get().min(8);
        let output = Command::new(&self.binary)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(temp.path())
            .arg("-l")
            .arg(&self.lang)
            .arg("--no-timestamps")
            .arg("-t")
            .arg(threads.to_string())
            .args(&self.extra_args)
            .output()
            .with_context(|| format!("failed to run '{}'", self.binary))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("whisper failed ({}): {}", output.status, stderr.trim());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(finish_transcript(&stdout))
    }
}

/// Map a cleaned-but-empty transcript to the right no-speech message.
fn finish_transcript(stdout: &str) -> String {
    let cleaned = clean_transcript(stdout);
    if !cleaned.is_empty() {
        return cleaned;
    }
    if stdout.contains("[BLANK_AUDIO]") {
        NO_SPEECH_BLANK.to_string()
    } else {
        NO_SPEECH_EMPTY.to_string()
    }
}

/// Scrub whisper stdout: per-line bracket tags go first, then blank-audio
/// markers and parenthetical stage notes, then whitespace is collapsed.
fn clean_transcript(stdout: &str) -> String {
    static LINE_TAG: OnceLock<Regex> = OnceLock::new();
    static ARTIFACTS: OnceLock<Regex> = OnceLock::new();
    let line_tag = LINE_TAG
        .get_or_init(|| Regex::new(r"^\[.*?\]\s*").expect("line tag regex should compile"));
    let artifacts = ARTIFACTS.get_or_init(|| {
        Regex::new(r"(?i)\[BLANK_AUDIO\]|\[INAUDIBLE\]|\(.*?\)")
            .expect("artifact regex should compile")
    });

    let joined = stdout
        .trim()
        .lines()
        .map(|line| line_tag.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let stripped = artifacts.replace_all(&joined, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Temp-file guard; the segment WAV disappears when transcription is done.
struct TempWav {
    path: PathBuf,
}

impl TempWav {
    fn write(wav: &[u8]) -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("voxcoach_{}_{n}.wav", std::process::id()));
        std::fs::write(&path, wav)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempWav {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

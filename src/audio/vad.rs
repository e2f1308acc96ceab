//! Voice activity detection: the per-tick state machine that decides when a
//! speech segment starts, when silence has held long enough to end it, and
//! whether the finished segment is worth transcribing.

use super::floor::NoiseFloor;
use super::mixer::SourceKind;
use crate::config::SessionConfig;

/// Session speech state. `Processing` is cosmetic: the orchestrator reports
/// it while a segment is being handed off, but the machine itself only moves
/// between `Idle`, `Listening`, and `Speaking`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadState {
    Idle,
    Listening,
    Speaking,
    Processing,
}

impl VadState {
    pub fn label(self) -> &'static str {
        match self {
            VadState::Idle => "idle",
            VadState::Listening => "listening",
            VadState::Speaking => "speaking",
            VadState::Processing => "processing",
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            VadState::Idle => 0,
            VadState::Listening => 1,
            VadState::Speaking => 2,
            VadState::Processing => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => VadState::Listening,
            2 => VadState::Speaking,
            3 => VadState::Processing,
            _ => VadState::Idle,
        }
    }
}

/// Detection constants for one source class, on the 0-255 loudness scale.
///
/// System audio is quieter and cleaner than a room microphone, so it gets a
/// lower base and a tighter margin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ThresholdProfile {
    pub base: f32,
    pub margin: f32,
}

impl ThresholdProfile {
    pub const MIC: Self = Self {
        base: 20.0,
        margin: 15.0,
    };
    pub const SYSTEM: Self = Self {
        base: 10.0,
        margin: 10.0,
    };

    /// Effective threshold given the current ambient floor.
    pub fn threshold(&self, noise_floor: f32) -> f32 {
        self.base.max(noise_floor + self.margin)
    }
}

/// Tunables for the VAD state machine.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Continuous silence required before a segment is finalized.
    pub silence_hold_ms: u64,
    /// Segments shorter than this (onset to finalize) are discarded.
    pub min_speech_ms: u64,
    /// Capacity of the rolling noise-floor window.
    pub noise_window: usize,
    pub mic: ThresholdProfile,
    pub system: ThresholdProfile,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            silence_hold_ms: 1_500,
            min_speech_ms: 500,
            noise_window: 50,
            mic: ThresholdProfile::MIC,
            system: ThresholdProfile::SYSTEM,
        }
    }
}

impl From<&SessionConfig> for VadConfig {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            silence_hold_ms: cfg.silence_hold_ms,
            min_speech_ms: cfg.min_speech_ms,
            noise_window: cfg.noise_window,
            mic: ThresholdProfile {
                base: cfg.mic_base_threshold,
                margin: cfg.mic_noise_margin,
            },
            system: ThresholdProfile {
                base: cfg.system_base_threshold,
                margin: cfg.system_noise_margin,
            },
        }
    }
}

/// What a tick produced, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    SpeechStarted { at_ms: u64 },
    SpeechEnded(SpeechOutcome),
}

/// A closed segment as seen by the VAD: timing, peak, and the emit decision.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOutcome {
    pub started_at_ms: u64,
    pub duration_ms: u64,
    pub peak: f32,
    pub kind: SourceKind,
    pub verdict: SpeechVerdict,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpeechVerdict {
    /// Passed the duration and peak gates; hand the audio downstream.
    Emit,
    /// Under the minimum speech duration.
    TooShort,
    /// Peak never cleared the source's base threshold.
    TooQuiet,
    /// Session stopped mid-segment; never emitted.
    Cancelled,
}

/// The emit/discard gate for a finished segment.
pub fn emit_verdict(duration_ms: u64, peak: f32, base: f32, min_speech_ms: u64) -> SpeechVerdict {
    if duration_ms < min_speech_ms {
        SpeechVerdict::TooShort
    } else if peak <= base {
        SpeechVerdict::TooQuiet
    } else {
        SpeechVerdict::Emit
    }
}

#[derive(Debug, Clone)]
struct ActiveSpeech {
    started_at_ms: u64,
    peak: f32,
    kind: SourceKind,
}

/// Tick-driven speech/silence state machine.
///
/// Timing is expressed as milliseconds since session start so ticks stay
/// deterministic in tests; the silence-confirmation "timer" is a deadline
/// checked inside the tick, which makes cancellation atomic with respect to
/// every other transition.
pub struct VadMachine {
    cfg: VadConfig,
    state: VadState,
    floor: NoiseFloor,
    speech: Option<ActiveSpeech>,
    silence_deadline_ms: Option<u64>,
}

impl VadMachine {
    pub fn new(cfg: VadConfig) -> Self {
        let floor = NoiseFloor::new(cfg.noise_window);
        Self {
            cfg,
            state: VadState::Idle,
            floor,
            speech: None,
            silence_deadline_ms: None,
        }
    }

    /// Arm the machine for a fresh session.
    pub fn begin(&mut self) {
        self.state = VadState::Listening;
        self.speech = None;
        self.silence_deadline_ms = None;
        self.floor.clear();
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    pub fn noise_floor(&self) -> f32 {
        self.floor.value()
    }

    /// How many ambient samples the rolling window currently holds.
    pub fn noise_window_len(&self) -> usize {
        self.floor.len()
    }

    pub fn profile_for(&self, kind: SourceKind) -> ThresholdProfile {
        match kind {
            SourceKind::Mic => self.cfg.mic,
            SourceKind::System => self.cfg.system,
        }
    }

    /// Threshold a level must exceed this tick to count as speech.
    pub fn threshold_for(&self, kind: SourceKind) -> f32 {
        self.profile_for(kind).threshold(self.floor.value())
    }

    /// Advance one tick with the winning source's level.
    ///
    /// The threshold is computed before this tick's sample can enter the
    /// noise window, and the window only collects while no segment is open,
    /// so speech never pollutes the ambient estimate.
    pub fn on_tick(&mut self, kind: SourceKind, level: f32, now_ms: u64) -> Option<TickEvent> {
        if self.state == VadState::Idle {
            return None;
        }
        let threshold = self.threshold_for(kind);

        if level > threshold {
            // Speech resumed or continues; any pending stop is off.
            self.silence_deadline_ms = None;
            return match self.speech.as_mut() {
                Some(active) => {
                    active.peak = active.peak.max(level);
                    None
                }
                None => {
                    self.speech = Some(ActiveSpeech {
                        started_at_ms: now_ms,
                        peak: level,
                        kind,
                    });
                    self.state = VadState::Speaking;
                    Some(TickEvent::SpeechStarted { at_ms: now_ms })
                }
            };
        }

        if self.speech.is_some() {
            match self.silence_deadline_ms {
                // At most one pending stop per segment.
                None => {
                    self.silence_deadline_ms =
                        Some(now_ms.saturating_add(self.cfg.silence_hold_ms));
                    None
                }
                Some(deadline) if now_ms >= deadline => self
                    .finalize_speech(now_ms)
                    .map(TickEvent::SpeechEnded),
                Some(_) => None,
            }
        } else {
            self.floor.observe(level);
            None
        }
    }

    /// End the session. An open segment is cancelled, never emitted.
    pub fn stop(&mut self, now_ms: u64) -> Option<SpeechOutcome> {
        self.silence_deadline_ms = None;
        let outcome = self.speech.take().map(|active| SpeechOutcome {
            started_at_ms: active.started_at_ms,
            duration_ms: now_ms.saturating_sub(active.started_at_ms),
            peak: active.peak,
            kind: active.kind,
            verdict: SpeechVerdict::Cancelled,
        });
        self.floor.clear();
        self.state = VadState::Idle;
        outcome
    }

    fn finalize_speech(&mut self, now_ms: u64) -> Option<SpeechOutcome> {
        let active = self.speech.take()?;
        self.silence_deadline_ms = None;
        self.state = VadState::Listening;
        // The ambient estimate restarts after every segment.
        self.floor.clear();
        let duration_ms = now_ms.saturating_sub(active.started_at_ms);
        let base = self.profile_for(active.kind).base;
        let verdict = emit_verdict(duration_ms, active.peak, base, self.cfg.min_speech_ms);
        Some(SpeechOutcome {
            started_at_ms: active.started_at_ms,
            duration_ms,
            peak: active.peak,
            kind: active.kind,
            verdict,
        })
    }

}

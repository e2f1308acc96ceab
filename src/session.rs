//! Live session orchestration.
//!
//! Two threads run per session. The monitor owns the capture streams (CPAL
//! streams are not `Send`, so they never leave it) and ticks the
//! mix -> meter -> VAD -> segment pipeline. The forwarder pulls finished
//! segments off a bounded queue and serializes transcription and answer
//! generation so segments resolve strictly in capture order. Events flow
//! back to the caller over a channel; shared state is limited to the stop
//! flag, the status cell, the level meters, and the conversation history.

use crate::answer::{AnswerProvider, AnswerRequest, HISTORY_WINDOW};
use crate::audio::{
    CaptureSource, EmittedSegment, LiveMeter, MixerGraph, SegmentClose, SegmentRecorder,
    SourceKind, SourceStrip, SpeechOutcome, TickEvent, VadConfig, VadMachine, VadState,
};
use crate::config::SessionConfig;
use crate::history::ConversationHistory;
use crate::logging::{log_debug, log_debug_content};
use crate::stt::{self, Transcriber};
use anyhow::{anyhow, bail, Result};
use crossbeam_channel::{bounded, Receiver as SegmentReceiver, Sender as SegmentSender};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

/// Messages the session threads push back to the caller.
///
/// `StateChanged` reports machine transitions from the monitor; the cosmetic
/// `Processing` state is visible only through [`Session::status`].
#[derive(Debug)]
pub enum SessionEvent {
    StateChanged(VadState),
    /// One requested source failed to open; the session runs without it.
    SourceDropped { kind: SourceKind, error: String },
    /// A segment cleared every gate and entered the transcription queue.
    SegmentQueued { seq: u64, duration_ms: u64 },
    /// A segment transcribed to usable text.
    Transcript { seq: u64, text: String },
    /// A segment transcribed to a no-speech marker and was dropped.
    NoSpeech { seq: u64, text: String },
    /// The generated answer for the matching transcript.
    Answer { seq: u64, text: String },
    /// A non-fatal pipeline error; the session keeps running.
    Error(String),
    /// Both threads are done; no further events follow.
    Stopped,
}

/// Lock-free view of the current speech state for pollers.
///
/// The monitor writes machine transitions; the forwarder overlays
/// `Processing` while a segment is in flight, but never clobbers `Speaking`.
#[derive(Clone)]
pub struct SessionStatus {
    cell: Arc<AtomicU8>,
}

impl SessionStatus {
    fn new() -> Self {
        Self {
            cell: Arc::new(AtomicU8::new(VadState::Idle.as_u8())),
        }
    }

    fn set(&self, state: VadState) {
        self.cell.store(state.as_u8(), Ordering::Relaxed);
    }

    fn swap_if(&self, from: VadState, to: VadState) {
        let _ = self.cell.compare_exchange(
            from.as_u8(),
            to.as_u8(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub fn get(&self) -> VadState {
        VadState::from_u8(self.cell.load(Ordering::Relaxed))
    }
}

/// Shared cells and channels the monitor thread writes into.
struct MonitorLink {
    stop_flag: Arc<AtomicBool>,
    status: SessionStatus,
    events: mpsc::Sender<SessionEvent>,
    segments: SegmentSender<EmittedSegment>,
    mic_level: LiveMeter,
    system_level: LiveMeter,
}

/// Everything the forwarder needs besides the segment queue itself.
struct DispatchLink {
    transcriber: Box<dyn Transcriber>,
    provider: Option<Box<dyn AnswerProvider>>,
    history: ConversationHistory,
    status: SessionStatus,
    events: mpsc::Sender<SessionEvent>,
}

/// A running capture/transcribe/answer session.
pub struct Session {
    /// Event stream; closed shortly after [`SessionEvent::Stopped`].
    pub events: mpsc::Receiver<SessionEvent>,
    stop_flag: Arc<AtomicBool>,
    status: SessionStatus,
    history: ConversationHistory,
    mic_level: LiveMeter,
    system_level: LiveMeter,
    monitor: Option<thread::JoinHandle<()>>,
    forwarder: Option<thread::JoinHandle<()>>,
}

impl Session {
    /// Start the session threads, returning once the requested sources are
    /// open. Fails if no source at all could be acquired.
    pub fn start(
        config: SessionConfig,
        transcriber: Box<dyn Transcriber>,
        provider: Option<Box<dyn AnswerProvider>>,
        history: ConversationHistory,
    ) -> Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let status = SessionStatus::new();
        let mic_level = LiveMeter::new();
        let system_level = LiveMeter::new();
        let (event_tx, event_rx) = mpsc::channel();
        let (segment_tx, segment_rx) = bounded::<EmittedSegment>(config.queue_depth.max(1));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let monitor = {
            let config = config.clone();
            let link = MonitorLink {
                stop_flag: stop_flag.clone(),
                status: status.clone(),
                events: event_tx.clone(),
                segments: segment_tx,
                mic_level: mic_level.clone(),
                system_level: system_level.clone(),
            };
            thread::spawn(move || run_monitor(config, link, ready_tx))
        };

        // The monitor reports acquisition before its first tick; surface a
        // failure to the caller instead of starting a dead session.
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                let _ = monitor.join();
                return Err(err);
            }
            Err(_) => {
                let _ = monitor.join();
                return Err(anyhow!("audio monitor exited before startup finished"));
            }
        }

        let forwarder = {
            let config = config.clone();
            let link = DispatchLink {
                transcriber,
                provider,
                history: history.clone(),
                status: status.clone(),
                events: event_tx,
            };
            thread::spawn(move || run_forwarder(config, segment_rx, link))
        };

        Ok(Self {
            events: event_rx,
            stop_flag,
            status,
            history,
            mic_level,
            system_level,
            monitor: Some(monitor),
            forwarder: Some(forwarder),
        })
    }

    /// Ask both threads to wind down without blocking.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Stop and join both threads, draining queued segments first. Safe to
    /// call more than once.
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.monitor.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.forwarder.take() {
            let _ = handle.join();
        }
    }

    pub fn status(&self) -> VadState {
        self.status.get()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Current microphone level on the 0-255 scale, zero when unused.
    pub fn mic_level(&self) -> f32 {
        self.mic_level.level()
    }

    /// Current system-audio level on the 0-255 scale, zero when unused.
    pub fn system_level(&self) -> f32 {
        self.system_level.level()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_monitor(config: SessionConfig, link: MonitorLink, ready: mpsc::SyncSender<Result<()>>) {
    let (mut graph, sources) = match open_sources(&config, &link) {
        Ok(pair) => pair,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    tracing::info!(
        capture = config.capture.label(),
        sources = sources.len(),
        tick_ms = config.tick_ms,
        "session started"
    );

    let mut vad = VadMachine::new(VadConfig::from(&config));
    vad.begin();
    let mut recorder = SegmentRecorder::new(config.pre_roll_ms, config.min_segment_bytes);
    let mut last_state = vad.state();
    link.status.set(last_state);
    let _ = link.events.send(SessionEvent::StateChanged(last_state));

    let epoch = Instant::now();
    let tick = Duration::from_millis(config.tick_ms.max(1));

    while !link.stop_flag.load(Ordering::Relaxed) {
        let tick_started = Instant::now();
        let mix = graph.poll();
        for (kind, level) in mix.levels.iter().copied() {
            match kind {
                SourceKind::Mic => link.mic_level.set_level(level),
                SourceKind::System => link.system_level.set_level(level),
            }
        }
        recorder.absorb(&mix.mixed);

        let now_ms = epoch.elapsed().as_millis() as u64;
        if let Some((kind, level)) = mix.loudest() {
            match vad.on_tick(kind, level, now_ms) {
                Some(TickEvent::SpeechStarted { .. }) => recorder.open(),
                Some(TickEvent::SpeechEnded(outcome)) => {
                    finish_segment(&mut recorder, &outcome, &link);
                }
                None => {}
            }
        }

        let state = vad.state();
        if state != last_state {
            link.status.set(state);
            let _ = link.events.send(SessionEvent::StateChanged(state));
            last_state = state;
        }

        let elapsed = tick_started.elapsed();
        if elapsed < tick {
            thread::sleep(tick - elapsed);
        }
    }

    // Manual stop: close any open segment as cancelled before winding down.
    if let Some(outcome) = vad.stop(epoch.elapsed().as_millis() as u64) {
        finish_segment(&mut recorder, &outcome, &link);
    }
    for source in &sources {
        source.pause();
    }
    drop(sources);
    link.status.set(VadState::Idle);
    let _ = link.events.send(SessionEvent::StateChanged(VadState::Idle));
    tracing::info!("session stopped");
    // Dropping `link.segments` here closes the queue; the forwarder drains
    // what is left and exits.
}

/// Open every requested source. In `both` mode a single failure downgrades
/// the session to the surviving source; losing all of them is fatal.
fn open_sources(
    config: &SessionConfig,
    link: &MonitorLink,
) -> Result<(MixerGraph, Vec<CaptureSource>)> {
    let mut graph = MixerGraph::new();
    let mut sources = Vec::new();
    let mut failures: Vec<(SourceKind, anyhow::Error)> = Vec::new();

    if config.capture.wants_mic() {
        match CaptureSource::open(
            SourceKind::Mic,
            config.input_device.as_deref(),
            config.channel_capacity,
        ) {
            Ok((source, feed)) => {
                graph.add_strip(SourceStrip::new(
                    feed.kind,
                    feed.device_rate,
                    config.mic_gain,
                    feed.frames,
                    feed.dropped,
                ));
                sources.push(source);
            }
            Err(err) => failures.push((SourceKind::Mic, err)),
        }
    }
    if config.capture.wants_system() {
        match CaptureSource::open(
            SourceKind::System,
            config.system_source.as_deref(),
            config.channel_capacity,
        ) {
            Ok((source, feed)) => {
                graph.add_strip(SourceStrip::new(
                    feed.kind,
                    feed.device_rate,
                    config.system_gain,
                    feed.frames,
                    feed.dropped,
                ));
                sources.push(source);
            }
            Err(err) => failures.push((SourceKind::System, err)),
        }
    }

    if sources.is_empty() {
        let detail = failures
            .iter()
            .map(|(kind, err)| format!("{}: {err:#}", kind.label()))
            .collect::<Vec<_>>()
            .join("; ");
        bail!("no audio source could be opened ({detail})");
    }
    for (kind, err) in failures {
        log_debug(&format!("source_degraded|kind={}|{err:#}", kind.label()));
        let _ = link.events.send(SessionEvent::SourceDropped {
            kind,
            error: format!("{err:#}"),
        });
    }
    Ok((graph, sources))
}

/// Close the open segment and, if it was emitted, queue it for dispatch.
fn finish_segment(recorder: &mut SegmentRecorder, outcome: &SpeechOutcome, link: &MonitorLink) {
    let close = match recorder.close(outcome) {
        Ok(close) => close,
        Err(err) => {
            log_debug(&format!("segment_encode_error|{err:#}"));
            let _ = link
                .events
                .send(SessionEvent::Error(format!("segment encoding failed: {err:#}")));
            return;
        }
    };

    {
        let metrics = close.metrics();
        log_debug(&format!(
            "segment_close|seq={}|end={}|duration_ms={}|peak={:.1}|samples={}|wav_bytes={}",
            metrics.seq,
            metrics.end.label(),
            metrics.duration_ms,
            metrics.peak,
            metrics.samples,
            metrics.wav_bytes
        ));
        tracing::info!(
            seq = metrics.seq,
            end = metrics.end.label(),
            duration_ms = metrics.duration_ms,
            peak = f64::from(metrics.peak),
            wav_bytes = metrics.wav_bytes,
            "segment closed"
        );
    }

    if let SegmentClose::Emitted(segment, _) = close {
        let _ = link.events.send(SessionEvent::SegmentQueued {
            seq: segment.seq,
            duration_ms: segment.duration_ms,
        });
        // Blocking send: when the queue is full the tick loop waits here
        // instead of dropping speech.
        if link.segments.send(segment).is_err() {
            log_debug("segment_queue_closed|segment dropped");
        }
    }
}

fn run_forwarder(
    config: SessionConfig,
    segments: SegmentReceiver<EmittedSegment>,
    link: DispatchLink,
) {
    for segment in segments.iter() {
        link.status.swap_if(VadState::Listening, VadState::Processing);
        process_segment(&config, &segment, &link);
        link.status.swap_if(VadState::Processing, VadState::Listening);
    }
    let _ = link.events.send(SessionEvent::Stopped);
}

/// Handle one emitted segment: transcribe, filter, answer, record.
fn process_segment(config: &SessionConfig, segment: &EmittedSegment, link: &DispatchLink) {
    let stt_started = Instant::now();
    let transcript = match link.transcriber.transcribe(&segment.wav) {
        Ok(text) => text,
        Err(err) => {
            log_debug(&format!("transcribe_error|seq={}|{err:#}", segment.seq));
            let _ = link
                .events
                .send(SessionEvent::Error(format!("transcription failed: {err:#}")));
            return;
        }
    };
    let stt_ms = stt_started.elapsed().as_millis() as u64;

    if stt::is_no_speech(&transcript) {
        log_debug(&format!(
            "segment_skip|seq={}|reason=no_speech|stt_ms={stt_ms}",
            segment.seq
        ));
        let _ = link.events.send(SessionEvent::NoSpeech {
            seq: segment.seq,
            text: transcript,
        });
        return;
    }

    log_debug_content(&format!("transcript: {transcript}"));
    let _ = link.events.send(SessionEvent::Transcript {
        seq: segment.seq,
        text: transcript.clone(),
    });

    let Some(provider) = link.provider.as_deref() else {
        if config.log_timings {
            log_debug(&format!(
                "timing|phase=transcribe|seq={}|audio_ms={}|stt_ms={stt_ms}|chars={}",
                segment.seq,
                segment.duration_ms,
                transcript.chars().count()
            ));
        }
        return;
    };

    let recent = link.history.recent(HISTORY_WINDOW);
    let request = AnswerRequest {
        prompt: &transcript,
        size: config.response_size,
        history: &recent,
        model: config.answer_model.as_deref(),
        temperature: config.temperature,
    };
    let answer_started = Instant::now();
    // A provider failure becomes the visible answer text so the exchange
    // still lands in history and on screen.
    let answer = match provider.generate(&request) {
        Ok(text) => text,
        Err(err) => {
            log_debug(&format!("answer_error|provider={}|{err:#}", provider.name()));
            format!("Error: {err:#}")
        }
    };
    let answer_ms = answer_started.elapsed().as_millis() as u64;

    link.history.push_exchange(&transcript, &answer);
    log_debug_content(&format!("answer: {answer}"));
    let _ = link.events.send(SessionEvent::Answer {
        seq: segment.seq,
        text: answer,
    });

    if config.log_timings {
        log_debug(&format!(
            "timing|phase=segment|seq={}|audio_ms={}|stt_ms={stt_ms}|answer_ms={answer_ms}|history_turns={}",
            segment.seq,
            segment.duration_ms,
            link.history.len()
        ));
    }
    tracing::info!(
        seq = segment.seq,
        audio_ms = segment.duration_ms,
        stt_ms,
        answer_ms,
        provider = provider.name(),
        "segment answered"
    );
}

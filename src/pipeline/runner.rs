//! Orchestrator: drives one Idle → … → Idle cycle per user turn.
//!
//! # Turn flow
//!
//! ```text
//! Idle
//!   └─▶ wake listener thread (device feed) ──recv().await── select ── shutdown
//!         └─ WakeWord  → join listener                               [Armed]
//!               └─▶ arm pause
//!                     └─▶ stop listener thread (tap feed)
//!                         spawn_blocking(RecordingSession::capture)  [Recording]
//!                           └─▶ transcriber.transcribe(audio)
//!                                 ├─ empty → abort                   [Idle]
//!                                 └─ text  → reset signal, dispatch  [Dispatching]
//!                                              └─▶ hook speaks → slot + signal
//!                                                    └─ wait(timeout) [Replying]
//!                                                                     [Idle]
//! ```
//!
//! Every exit from a turn, success or not, passes through
//! `Orchestrator::finish`, which returns the session to Idle.  Nothing
//! inside a turn can stop the loop; only [`Shutdown`] does.

use std::sync::Arc;

use crate::audio::{tap_channel, AudioSource};
use crate::config::{AppConfig, ListenerConfig, RecordingConfig, TurnConfig, WakeTimeoutPolicy};
use crate::listening::{
    detection_channel, BackgroundListener, DetectionEvent, DetectionKind, ListenMode, ListenerFeed,
    PhraseDetector, PhraseSet,
};
use crate::llm::ReasoningService;
use crate::recording::{EndReason, RecordingOutcome, RecordingSession};
use crate::stt::{PhraseRecognizer, Transcriber, Transcript};
use crate::tts::Synthesizer;

use super::reply::ReplyHook;
use super::shutdown::Shutdown;
use super::signal::{CompletionSignal, ReplyOutcome, ReplySlot};
use super::state::{SessionState, StateMachine};
use super::turn::{AbortReason, RunStats, TurnError, TurnOutcome, TurnSummary};

/// Chunks buffered for the stop listener; older audio is dropped for the
/// listener (never for the recording) when it falls behind.
const TAP_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// External services the orchestrator calls through narrow traits.
pub struct Collaborators {
    pub source: Arc<dyn AudioSource>,
    pub recognizer: Arc<dyn PhraseRecognizer>,
    pub transcriber: Arc<dyn Transcriber>,
    pub agent: Arc<dyn ReasoningService>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Owns the session state and runs turns until shutdown.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use nero_voice::config::AppConfig;
/// # use nero_voice::pipeline::{Collaborators, Orchestrator, Shutdown};
/// # async fn example(collaborators: Collaborators) {
/// let config = AppConfig::default();
/// let shutdown = Shutdown::new();
/// let mut orchestrator = Orchestrator::new(&config, collaborators, shutdown.clone());
///
/// tokio::spawn(async move {
///     nero_voice::pipeline::wait_for_signal().await;
///     shutdown.trigger();
/// });
/// let stats = orchestrator.run().await;
/// println!("{} turns", stats.turns());
/// # }
/// ```
pub struct Orchestrator {
    machine: StateMachine,
    detector: Arc<PhraseDetector>,
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    agent: Arc<dyn ReasoningService>,
    wake_phrases: PhraseSet,
    stop_phrases: PhraseSet,
    listener: ListenerConfig,
    recording: RecordingConfig,
    turn: TurnConfig,
    signal: CompletionSignal,
    slot: ReplySlot,
    shutdown: Shutdown,
}

impl Orchestrator {
    /// Build the orchestrator and register the reply hook on the agent.
    pub fn new(config: &AppConfig, collaborators: Collaborators, shutdown: Shutdown) -> Self {
        let Collaborators {
            source,
            recognizer,
            transcriber,
            agent,
            synthesizer,
        } = collaborators;

        let signal = CompletionSignal::new();
        let slot = ReplySlot::default();
        agent.set_response_hook(Arc::new(ReplyHook::new(
            synthesizer,
            signal.clone(),
            slot.clone(),
        )));

        Self {
            machine: StateMachine::new(),
            detector: Arc::new(PhraseDetector::from_config(recognizer, config)),
            source,
            transcriber,
            agent,
            wake_phrases: PhraseSet::new(&config.phrases.wake),
            stop_phrases: PhraseSet::new(&config.phrases.stop),
            listener: config.listener.clone(),
            recording: config.recording.clone(),
            turn: config.turn.clone(),
            signal,
            slot,
            shutdown,
        }
    }

    /// Replace the phrase detector, e.g. to tune segmentation below the
    /// one-second granularity of the config file.
    pub fn with_detector(mut self, detector: PhraseDetector) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<SessionState> {
        self.machine.subscribe()
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Run turns until shutdown is requested.
    pub async fn run(&mut self) -> RunStats {
        let mut stats = RunStats::default();
        log::info!("pipeline: ready, listening for the wake phrase");

        while !self.shutdown.is_triggered() {
            let outcome = self.run_turn().await;
            stats.record(&outcome);

            match outcome {
                TurnOutcome::Shutdown => break,
                TurnOutcome::NoWake(DetectionKind::Timeout) => match self.listener.on_wake_timeout {
                    WakeTimeoutPolicy::Rearm => {}
                    WakeTimeoutPolicy::Shutdown => {
                        log::info!("pipeline: wake timeout reached, stopping");
                        self.shutdown.trigger();
                    }
                },
                TurnOutcome::NoWake(_) => self.back_off().await,
                _ => {}
            }
        }

        log::info!(
            "pipeline: stopped after {} turns ({} completed, {} aborted, {} failed)",
            stats.turns(),
            stats.completed,
            stats.aborted,
            stats.failed
        );
        stats
    }

    /// Run exactly one turn and return to Idle.
    pub async fn run_turn(&mut self) -> TurnOutcome {
        let outcome = self.turn().await;
        self.finish(&outcome);
        outcome
    }

    async fn turn(&mut self) -> TurnOutcome {
        self.machine.transition(SessionState::Idle);

        let wake = match self.wait_for_wake().await {
            Ok(event) => event,
            Err(outcome) => return outcome,
        };
        log::debug!(
            "pipeline: wake phrase '{}' ({} bytes of audio)",
            wake.matched_phrase.as_deref().unwrap_or_default(),
            wake.payload.as_ref().map_or(0, Vec::len)
        );

        self.machine.transition(SessionState::Armed);
        tokio::time::sleep(self.turn.arm_pause()).await;

        self.machine.transition(SessionState::Recording);
        let recorded = match self.record().await {
            Ok(outcome) => outcome,
            Err(outcome) => return outcome,
        };
        if recorded.is_empty() {
            return TurnOutcome::Aborted(AbortReason::EmptyRecording);
        }
        log::info!(
            "pipeline: recorded {:.1}s, ended by {:?}",
            recorded.elapsed.as_secs_f64(),
            recorded.end_reason
        );
        let recording_end = recorded.end_reason;

        let transcript = match self.transcribe(recorded).await {
            Ok(t) => t,
            Err(outcome) => return outcome,
        };
        if transcript.is_empty() {
            return TurnOutcome::Aborted(AbortReason::EmptyTranscript);
        }
        log::info!("pipeline: command: {}", transcript.text);

        self.dispatch(transcript, recording_end).await
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    /// Block on the wake listener, or on shutdown, whichever comes first.
    async fn wait_for_wake(&self) -> Result<DetectionEvent, TurnOutcome> {
        if self.shutdown.is_triggered() {
            return Err(TurnOutcome::Shutdown);
        }

        let (tx, mut rx) = detection_channel();
        let listener = BackgroundListener::spawn(
            Arc::clone(&self.detector),
            ListenerFeed::Device(Arc::clone(&self.source)),
            ListenMode::Wake,
            self.wake_phrases.clone(),
            self.listener.wake_timeout(),
            tx,
        )
        .map_err(|e| {
            log::error!("pipeline: cannot start wake listener: {e}");
            TurnOutcome::NoWake(DetectionKind::Error)
        })?;

        let event = tokio::select! {
            event = rx.recv() => event,
            _ = self.shutdown.wait() => None,
        };
        // The device must be released before the recording reopens it.
        listener.join().await;

        if self.shutdown.is_triggered() {
            return Err(TurnOutcome::Shutdown);
        }
        match event {
            Some(event) if event.kind == DetectionKind::WakeWord => Ok(event),
            Some(event) => Err(TurnOutcome::NoWake(event.kind)),
            None => Err(TurnOutcome::NoWake(DetectionKind::Error)),
        }
    }

    /// Record one command while a stop listener watches the same audio.
    async fn record(&self) -> Result<RecordingOutcome, TurnOutcome> {
        let (tap_tx, tap_rx) = tap_channel(TAP_CAPACITY);
        let (stop_tx, stop_rx) = detection_channel();

        // Never joined: dropping the handle cancels it and the thread winds
        // down on its own.
        let stop_listener = match BackgroundListener::spawn(
            Arc::clone(&self.detector),
            ListenerFeed::Tap(tap_rx),
            ListenMode::Stop,
            self.stop_phrases.clone(),
            None,
            stop_tx,
        ) {
            Ok(listener) => Some(listener),
            Err(e) => {
                log::warn!("pipeline: no stop listener ({e}), recording until timeout");
                None
            }
        };

        let session = RecordingSession::new(Arc::clone(&self.source), &self.recording)
            .with_stop_listener(stop_rx, tap_tx);
        let max = self.recording.max_duration();
        let result = tokio::task::spawn_blocking(move || session.capture(max)).await;
        drop(stop_listener);

        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(e)) => {
                log::error!("pipeline: cannot open the microphone: {e}");
                Err(TurnOutcome::Aborted(AbortReason::CaptureUnavailable))
            }
            Err(e) => Err(TurnOutcome::Failed(TurnError::Internal(format!(
                "recording task failed: {e}"
            )))),
        }
    }

    async fn transcribe(&self, recorded: RecordingOutcome) -> Result<Transcript, TurnOutcome> {
        let transcriber = Arc::clone(&self.transcriber);
        let audio = recorded.audio;
        match tokio::spawn(async move { transcriber.transcribe(&audio).await }).await {
            Ok(text) => Ok(Transcript::new(text)),
            Err(e) => Err(TurnOutcome::Failed(TurnError::Internal(format!(
                "transcription task failed: {e}"
            )))),
        }
    }

    /// Send the transcript to the agent and wait for the spoken reply.
    async fn dispatch(&mut self, transcript: Transcript, recording_end: EndReason) -> TurnOutcome {
        let epoch = self.signal.reset();
        self.slot.clear();
        self.machine.transition(SessionState::Dispatching);

        let agent = Arc::clone(&self.agent);
        let text = transcript.text.clone();
        let result = match tokio::spawn(async move { agent.dispatch(&text).await }).await {
            Ok(result) => result,
            Err(e) => {
                return TurnOutcome::Failed(TurnError::Internal(format!(
                    "dispatch task failed: {e}"
                )))
            }
        };

        for tool in &result.tool_invocations {
            log::info!("pipeline: tool {} ({})", tool.name, tool.input);
        }
        if !result.succeeded {
            let reason = result
                .failure
                .unwrap_or_else(|| "reasoning service reported failure".into());
            return TurnOutcome::Failed(TurnError::Reasoning(reason));
        }
        if result.response_text.trim().is_empty() {
            return TurnOutcome::Aborted(AbortReason::EmptyResponse);
        }

        let timeout = self.turn.response_timeout();
        if !self.signal.wait(timeout).await {
            return TurnOutcome::Failed(TurnError::ResponseTimeout(timeout));
        }
        if let Some(ReplyOutcome::Failed(reason)) = self.slot.take(epoch) {
            return TurnOutcome::Failed(TurnError::Synthesis(reason));
        }

        self.machine.transition(SessionState::Replying);
        tokio::time::sleep(self.turn.reply_pause()).await;

        TurnOutcome::Completed(TurnSummary {
            transcript: transcript.text,
            response: result.response_text,
            tool_count: result.tool_invocations.len(),
            estimated_cost_usd: result.estimated_cost_usd,
            recording_end,
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Log the outcome and bring the session back to Idle.
    fn finish(&mut self, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Completed(summary) => log::info!(
                "pipeline: turn completed ({} tool calls, ~${:.4})",
                summary.tool_count,
                summary.estimated_cost_usd
            ),
            TurnOutcome::Aborted(reason) => log::warn!("pipeline: turn aborted: {reason}"),
            TurnOutcome::Failed(e) => log::error!("pipeline: turn failed: {e}"),
            TurnOutcome::NoWake(DetectionKind::Timeout) => {
                log::info!("pipeline: no wake phrase before the timeout")
            }
            TurnOutcome::NoWake(kind) => log::warn!("pipeline: wake listener ended with {kind:?}"),
            TurnOutcome::Shutdown => {}
        }

        if self.machine.state() == SessionState::Dispatching {
            self.machine.transition(SessionState::Replying);
        }
        self.machine.transition(SessionState::Idle);
    }

    async fn back_off(&self) {
        let delay = self.listener.retry_delay();
        log::debug!("pipeline: retrying in {delay:?}");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.shutdown.wait() => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{silence, speech, AudioError, AudioStream, ScriptStep, ScriptedSource};
    use crate::listening::detector::test_segment_config;
    use crate::llm::MockAgent;
    use crate::stt::{MockRecognizer, MockTranscriber};
    use crate::tts::{MockSynthesizer, SpeakBehaviour};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.listener.energy_threshold = 0.05;
        config.listener.pause_ms = 100;
        config.listener.poll_ms = 10;
        config.listener.retry_delay_ms = 20;
        config.recording.max_secs = 1;
        config.recording.poll_ms = 10;
        config.turn.arm_pause_ms = 10;
        config.turn.response_timeout_secs = 1;
        config.turn.reply_pause_ms = 10;
        config
    }

    /// Wake utterance followed by a command utterance.
    fn wake_then_command() -> Vec<Vec<ScriptStep>> {
        vec![
            [speech(300), silence(200)].concat(),
            [speech(500), silence(300)].concat(),
        ]
    }

    struct Harness {
        recognizer: Arc<MockRecognizer>,
        transcriber: Arc<MockTranscriber>,
        agent: Arc<MockAgent>,
        synthesizer: Arc<MockSynthesizer>,
        shutdown: Shutdown,
        orchestrator: Orchestrator,
    }

    fn harness_with(
        config: AppConfig,
        source: Arc<dyn AudioSource>,
        recognizer: MockRecognizer,
        transcript: &str,
        agent: MockAgent,
        synthesizer: MockSynthesizer,
    ) -> Harness {
        let recognizer = Arc::new(recognizer);
        let transcriber = Arc::new(MockTranscriber::returning(transcript));
        let agent = Arc::new(agent);
        let synthesizer = Arc::new(synthesizer);
        let shutdown = Shutdown::new();

        let detector = PhraseDetector::new(
            recognizer.clone(),
            config.locale.clone(),
            test_segment_config(),
            test_segment_config(),
        );
        let orchestrator = Orchestrator::new(
            &config,
            Collaborators {
                source,
                recognizer: recognizer.clone(),
                transcriber: transcriber.clone(),
                agent: agent.clone(),
                synthesizer: synthesizer.clone(),
            },
            shutdown.clone(),
        )
        .with_detector(detector);

        Harness {
            recognizer,
            transcriber,
            agent,
            synthesizer,
            shutdown,
            orchestrator,
        }
    }

    fn harness(transcript: &str, agent: MockAgent, synthesizer: MockSynthesizer) -> Harness {
        harness_with(
            test_config(),
            Arc::new(ScriptedSource::new(wake_then_command())),
            MockRecognizer::texts(&["NERO OUVIR", "NERO ENVIAR"]),
            transcript,
            agent,
            synthesizer,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_turn_completes_and_returns_to_idle() {
        let source = Arc::new(ScriptedSource::new(wake_then_command()));
        let mut h = harness_with(
            test_config(),
            source.clone(),
            MockRecognizer::texts(&["NERO OUVIR", "NERO ENVIAR"]),
            "que horas são",
            MockAgent::replying("São três horas."),
            MockSynthesizer::playing(),
        );
        let mut states = h.orchestrator.subscribe();

        let outcome = h.orchestrator.run_turn().await;

        match outcome {
            TurnOutcome::Completed(summary) => {
                assert_eq!(summary.transcript, "que horas são");
                assert_eq!(summary.response, "São três horas.");
                assert_eq!(summary.recording_end, EndReason::StopWord);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
        assert_eq!(h.synthesizer.spoken(), vec!["São três horas.".to_string()]);
        assert_eq!(h.agent.calls(), 1);
        assert_eq!(h.recognizer.calls(), 2);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Idle);

        // The wake stream is closed before the recording stream opens.
        assert_eq!(source.open_count(), 2);
        assert_eq!(source.peak_live(), 1);
        assert_eq!(source.live(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn capture_timeout_with_empty_transcript_skips_dispatch() {
        let mut h = harness_with(
            test_config(),
            Arc::new(ScriptedSource::new(vec![
                [speech(300), silence(200)].concat(),
                [speech(200), silence(200)].concat(),
            ])),
            MockRecognizer::texts(&["NERO OUVIR"]),
            "",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );

        let started = Instant::now();
        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(outcome, TurnOutcome::Aborted(AbortReason::EmptyTranscript));
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(h.transcriber.calls(), 1);
        assert_eq!(h.agent.calls(), 0);
        assert!(h.synthesizer.spoken().is_empty());
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reasoning_failure_is_a_failed_turn() {
        let mut h = harness(
            "que horas são",
            MockAgent::failing("HTTP 500"),
            MockSynthesizer::playing(),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed(TurnError::Reasoning("HTTP 500".into()))
        );
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
        assert!(h.synthesizer.spoken().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reply_that_never_completes_times_out() {
        let mut h = harness(
            "que horas são",
            MockAgent::silent("São três horas."),
            MockSynthesizer::playing(),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed(TurnError::ResponseTimeout(Duration::from_secs(1)))
        );
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn synthesis_failure_fails_the_turn_without_waiting() {
        let mut h = harness(
            "que horas são",
            MockAgent::replying("São três horas."),
            MockSynthesizer::new(SpeakBehaviour::Fail("HTTP 401".into())),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert!(matches!(outcome, TurnOutcome::Failed(TurnError::Synthesis(_))));
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_while_waiting_for_wake_stops_the_loop() {
        let mut h = harness_with(
            test_config(),
            Arc::new(ScriptedSource::new(Vec::new())),
            MockRecognizer::texts(&[]),
            "",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );
        let trigger = h.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let stats = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.run())
            .await
            .expect("run did not stop on shutdown");

        assert_eq!(stats, RunStats::default());
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wake_timeout_with_shutdown_policy_ends_the_run() {
        let mut config = test_config();
        config.listener.wake_timeout_secs = Some(1);
        config.listener.on_wake_timeout = WakeTimeoutPolicy::Shutdown;
        let mut h = harness_with(
            config,
            Arc::new(ScriptedSource::new(Vec::new())),
            MockRecognizer::texts(&[]),
            "",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );

        let stats = tokio::time::timeout(Duration::from_secs(5), h.orchestrator.run())
            .await
            .expect("run did not stop after the wake timeout");

        assert_eq!(stats.turns(), 0);
        assert!(h.shutdown.is_triggered());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wake_timeout_with_rearm_policy_is_no_wake() {
        let mut config = test_config();
        config.listener.wake_timeout_secs = Some(1);
        let mut h = harness_with(
            config,
            Arc::new(ScriptedSource::new(Vec::new())),
            MockRecognizer::texts(&[]),
            "",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(outcome, TurnOutcome::NoWake(DetectionKind::Timeout));
        assert!(!h.shutdown.is_triggered());
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unavailable_device_during_wake_is_no_wake_error() {
        let mut h = harness_with(
            test_config(),
            Arc::new(ScriptedSource::unavailable()),
            MockRecognizer::texts(&[]),
            "",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(outcome, TurnOutcome::NoWake(DetectionKind::Error));
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    /// Serves the wake script, then refuses every later open.
    struct WakeOnlySource {
        inner: ScriptedSource,
        opens: AtomicUsize,
    }

    impl AudioSource for WakeOnlySource {
        fn open(&self) -> Result<Box<dyn AudioStream>, AudioError> {
            if self.opens.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.open()
            } else {
                Err(AudioError::Device("device busy".into()))
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn recording_device_failure_aborts_the_turn() {
        let source = WakeOnlySource {
            inner: ScriptedSource::new(vec![[speech(300), silence(200)].concat()]),
            opens: AtomicUsize::new(0),
        };
        let mut h = harness_with(
            test_config(),
            Arc::new(source),
            MockRecognizer::texts(&["nero ouvir"]),
            "que horas são",
            MockAgent::replying("nunca"),
            MockSynthesizer::playing(),
        );

        let outcome = h.orchestrator.run_turn().await;

        assert_eq!(outcome, TurnOutcome::Aborted(AbortReason::CaptureUnavailable));
        assert_eq!(h.transcriber.calls(), 0);
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn consecutive_turns_reuse_the_same_orchestrator() {
        let mut scripts = wake_then_command();
        scripts.extend(wake_then_command());
        let mut h = harness_with(
            test_config(),
            Arc::new(ScriptedSource::new(scripts)),
            MockRecognizer::texts(&["NERO OUVIR", "NERO ENVIAR", "NERO", "ENVIAR"]),
            "que horas são",
            MockAgent::replying("São três horas."),
            MockSynthesizer::playing(),
        );

        for _ in 0..2 {
            let outcome = h.orchestrator.run_turn().await;
            assert!(matches!(outcome, TurnOutcome::Completed(_)), "{outcome:?}");
        }
        assert_eq!(h.agent.calls(), 2);
        assert_eq!(h.synthesizer.spoken().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reply_finishing_after_its_timeout_does_not_complete_the_next_turn() {
        let mut scripts = wake_then_command();
        scripts.extend(wake_then_command());
        let mut h = harness_with(
            test_config(),
            Arc::new(ScriptedSource::new(scripts)),
            MockRecognizer::texts(&["NERO OUVIR", "NERO ENVIAR", "NERO", "ENVIAR"]),
            "que horas são",
            MockAgent::replying("São três horas."),
            MockSynthesizer::new(SpeakBehaviour::Play(Duration::from_millis(1_500))),
        );

        // Turn 1 gives up after 1 s while its reply plays on until 1.5 s,
        // which falls inside turn 2's own wait.
        for turn in 1..=2 {
            let outcome = h.orchestrator.run_turn().await;
            assert_eq!(
                outcome,
                TurnOutcome::Failed(TurnError::ResponseTimeout(Duration::from_secs(1))),
                "turn {turn}"
            );
        }
        assert_eq!(h.agent.calls(), 2);
        assert_eq!(h.synthesizer.spoken().len(), 2);
        assert_eq!(h.orchestrator.state(), SessionState::Idle);
    }
}

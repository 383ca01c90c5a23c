//! One command recording: the only owner of the capture device while a user
//! speaks.
//!
//! ```text
//!  RecordingSession::capture (blocking, spawn_blocking)
//!  ┌──────────────────────────────────────────────────────────┐
//!  │ open device                                              │
//!  │ loop:                                                    │
//!  │   stop event? ── try_recv ── StopWord ─► end StopWord    │
//!  │   elapsed ≥ max ─────────────────────► end Timeout       │
//!  │   read_chunk ── Err ─────────────────► end Error         │
//!  │       └─ Some(chunk) ─► keep + TapSender::offer          │
//!  │ drop device (and tap)                                    │
//!  └──────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{to_linear16, AudioError, AudioSource, TapSender};
use crate::config::RecordingConfig;
use crate::listening::{DetectionKind, DetectionReceiver, TryDetection};

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    StopWord,
    Timeout,
    Error,
}

/// Captured audio plus how the capture ended.
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    /// `linear16` mono PCM at 16 kHz; empty when nothing was captured.
    pub audio: Vec<u8>,
    pub end_reason: EndReason,
    pub elapsed: Duration,
}

impl RecordingOutcome {
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

struct StopWatch {
    rx: DetectionReceiver,
    tap: TapSender,
}

pub struct RecordingSession {
    source: Arc<dyn AudioSource>,
    poll: Duration,
    stop: Option<StopWatch>,
}

impl RecordingSession {
    pub fn new(source: Arc<dyn AudioSource>, config: &RecordingConfig) -> Self {
        Self {
            source,
            poll: config.poll_interval(),
            stop: None,
        }
    }

    /// End the recording when a StopWord arrives on `rx`, feeding the
    /// listener through `tap`.
    pub fn with_stop_listener(mut self, rx: DetectionReceiver, tap: TapSender) -> Self {
        self.stop = Some(StopWatch { rx, tap });
        self
    }

    /// Record until a stop word, `max_duration`, or a device error.
    ///
    /// Blocks; run it with `spawn_blocking`.  Only a device that cannot be
    /// opened is an `Err`; failures mid-capture end the outcome with
    /// [`EndReason::Error`] and keep the audio gathered so far.
    pub fn capture(self, max_duration: Duration) -> Result<RecordingOutcome, AudioError> {
        let Self { source, poll, mut stop } = self;
        let mut stream = source.open()?;

        let started = Instant::now();
        let mut samples: Vec<f32> = Vec::new();

        let end_reason = loop {
            if let Some(watch) = stop.as_mut() {
                match watch.rx.try_recv() {
                    TryDetection::Ready(ev) if ev.kind == DetectionKind::StopWord => {
                        log::info!(
                            "recording: stop phrase '{}' heard",
                            ev.matched_phrase.as_deref().unwrap_or_default()
                        );
                        break EndReason::StopWord;
                    }
                    TryDetection::Ready(ev) => {
                        log::warn!(
                            "recording: stop listener ended with {:?} ({}); continuing until timeout",
                            ev.kind,
                            ev.error.as_deref().unwrap_or("no detail")
                        );
                        stop = None;
                    }
                    TryDetection::Closed => stop = None,
                    TryDetection::Empty => {}
                }
            }

            if started.elapsed() >= max_duration {
                break EndReason::Timeout;
            }

            match stream.read_chunk(poll.min(max_duration)) {
                Ok(Some(chunk)) => {
                    if let Some(watch) = stop.as_ref() {
                        watch.tap.offer(&chunk);
                    }
                    samples.extend_from_slice(&chunk);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("recording: capture failed: {e}");
                    break EndReason::Error;
                }
            }
        };

        drop(stream);
        drop(stop);

        let elapsed = started.elapsed();
        log::debug!(
            "recording: {:?} after {:?} ({} samples)",
            end_reason,
            elapsed,
            samples.len()
        );

        Ok(RecordingOutcome {
            audio: to_linear16(&samples),
            end_reason,
            elapsed,
        })
    }
}

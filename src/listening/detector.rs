//! The listen-then-recognize loop behind every listener invocation.
//!
//! ```text
//! loop ─► next_segment ─► NoSpeech ──► deadline passed? ─► Timeout
//!              │                              └─ no ─► loop
//!              ├─► Speech ─► recognize ─► phrase match ─► WakeWord / StopWord
//!              │                 ├─► no match / NotUnderstood ─► loop
//!              │                 └─► RecognizeError ─► Error
//!              ├─► Failed / Closed ─► Error
//!              └─► Cancelled ─► (no event)
//! ```
//!
//! The first wake-mode run spends the calibration window measuring the
//! room.  From then on every segment gate uses at least 1.5x the ambient
//! RMS, so a noisy room does not read as permanent speech.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::audio::{to_linear16, AudioError, AudioStream, VadDetector};
use crate::config::AppConfig;
use crate::stt::{PhraseRecognizer, Recognition};

use super::event::{DetectionEvent, DetectionKind};
use super::phrases::PhraseSet;
use super::segment::{next_segment, Segment, SegmentConfig};

/// Which cue a listener is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenMode {
    Wake,
    Stop,
}

impl ListenMode {
    fn kind(self) -> DetectionKind {
        match self {
            Self::Wake => DetectionKind::WakeWord,
            Self::Stop => DetectionKind::StopWord,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Wake => "wake",
            Self::Stop => "stop",
        }
    }
}

/// Ambient RMS is scaled by this much to get the calibrated floor.
const AMBIENT_MARGIN: f32 = 1.5;

/// Shared by every listener the orchestrator spawns.
pub struct PhraseDetector {
    recognizer: Arc<dyn PhraseRecognizer>,
    locale: String,
    wake: SegmentConfig,
    stop: SegmentConfig,
    calibration: Duration,
    floor: OnceLock<f32>,
}

impl PhraseDetector {
    pub fn new(
        recognizer: Arc<dyn PhraseRecognizer>,
        locale: impl Into<String>,
        wake: SegmentConfig,
        stop: SegmentConfig,
    ) -> Self {
        Self {
            recognizer,
            locale: locale.into(),
            wake,
            stop,
            calibration: Duration::ZERO,
            floor: OnceLock::new(),
        }
    }

    /// Measure ambient noise for `window` before the first wake segment.
    /// `Duration::ZERO` turns calibration off.
    pub fn with_calibration(mut self, window: Duration) -> Self {
        self.calibration = window;
        self
    }

    /// Energy floor learned from the room, once calibration has run.
    pub fn calibrated_threshold(&self) -> Option<f32> {
        self.floor.get().copied()
    }

    pub fn from_config(recognizer: Arc<dyn PhraseRecognizer>, config: &AppConfig) -> Self {
        let l = &config.listener;
        let base = |attempt: u64, limit: u64| SegmentConfig {
            energy_threshold: l.energy_threshold,
            pause: Duration::from_millis(l.pause_ms),
            onset_timeout: Duration::from_secs(attempt),
            phrase_limit: Duration::from_secs(limit),
            poll: Duration::from_millis(l.poll_ms),
        };
        Self::new(
            recognizer,
            config.locale.clone(),
            base(l.wake_attempt_secs, l.wake_phrase_limit_secs),
            base(l.stop_attempt_secs, l.stop_phrase_limit_secs),
        )
        .with_calibration(Duration::from_millis(l.calibrate_ms))
    }

    fn calibrate_once(
        &self,
        feed: &mut dyn AudioStream,
        base: &SegmentConfig,
    ) -> Result<(), AudioError> {
        if self.calibration.is_zero() || self.floor.get().is_some() {
            return Ok(());
        }
        match VadDetector::calibrate(feed, self.calibration, base.poll)? {
            Some(ambient) => {
                let floor = *self.floor.get_or_init(|| ambient * AMBIENT_MARGIN);
                log::info!(
                    "listener: ambient noise calibrated (rms {ambient:.4}, threshold {:.4})",
                    base.energy_threshold.max(floor)
                );
            }
            None => log::warn!("listener: no audio during calibration, will retry"),
        }
        Ok(())
    }

    fn segment_config(&self, mode: ListenMode) -> &SegmentConfig {
        match mode {
            ListenMode::Wake => &self.wake,
            ListenMode::Stop => &self.stop,
        }
    }

    /// Run until a phrase from `phrases` is heard, the optional overall
    /// `timeout` passes, or something fails.  Returns `None` only when
    /// `cancel` was raised.
    pub fn detect(
        &self,
        feed: &mut dyn AudioStream,
        mode: ListenMode,
        phrases: &PhraseSet,
        timeout: Option<Duration>,
        cancel: &AtomicBool,
    ) -> Option<DetectionEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let base = self.segment_config(mode);

        if mode == ListenMode::Wake {
            if let Err(e) = self.calibrate_once(feed, base) {
                log::error!("listener: calibration failed: {e}");
                return Some(DetectionEvent::error(e.to_string()));
            }
        }
        let threshold = match self.calibrated_threshold() {
            Some(floor) => base.energy_threshold.max(floor),
            None => base.energy_threshold,
        };

        loop {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }

            let mut attempt = base.clone();
            attempt.energy_threshold = threshold;
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Some(DetectionEvent::timeout());
                }
                attempt.onset_timeout = attempt.onset_timeout.min(remaining);
            }

            let samples = match next_segment(feed, &attempt, cancel) {
                Segment::Speech(samples) => samples,
                Segment::NoSpeech => continue,
                Segment::Cancelled => return None,
                Segment::Closed => return Some(DetectionEvent::error("audio feed closed")),
                Segment::Failed(msg) => return Some(DetectionEvent::error(msg)),
            };

            match self.recognizer.recognize(&samples, &self.locale) {
                Ok(Recognition::Text(text)) => {
                    if let Some(phrase) = phrases.find_in(&text) {
                        log::info!("listener: {} phrase '{phrase}' heard", mode.label());
                        return Some(DetectionEvent::detected(
                            mode.kind(),
                            phrase,
                            to_linear16(&samples),
                        ));
                    }
                    log::debug!("listener: ignoring '{text}' while waiting for {} phrase", mode.label());
                }
                Ok(Recognition::NotUnderstood) => {
                    log::debug!("listener: speech not understood");
                }
                Err(e) => {
                    log::error!("listener: recognition failed: {e}");
                    return Some(DetectionEvent::error(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_segment_config() -> SegmentConfig {
    SegmentConfig {
        energy_threshold: 0.05,
        pause: Duration::from_millis(100),
        onset_timeout: Duration::from_millis(50),
        phrase_limit: Duration::from_millis(2_000),
        poll: Duration::from_millis(10),
    }
}

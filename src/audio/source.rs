//! Audio sources: where 16 kHz mono chunks come from.
//!
//! ```text
//! AudioSource::open() ──► Box<dyn AudioStream> ──read_chunk(timeout)──► Vec<f32>
//!                               │
//!                        owns the device; drop = release
//! ```
//!
//! A stream is opened on the thread that reads it (cpal streams are not
//! `Send`), so sources hand out streams lazily instead of being streams.
//!
//! The [`tap_channel`] lets a Recording Session share the chunks it has
//! already captured with the stop-word listener, so only one component ever
//! holds the capture device.

use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

use super::capture::{AudioCapture, CaptureMessage, StreamHandle};
use super::resample::{stereo_to_mono, StreamResampler};
use super::SAMPLE_RATE;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The producer side went away; no more audio will ever arrive.
    #[error("audio feed closed")]
    Closed,

    /// The running stream reported a failure.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The device could not be opened.
    #[error("audio device unavailable: {0}")]
    Device(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A live feed of 16 kHz mono samples.
pub trait AudioStream {
    /// Wait up to `timeout` for the next chunk.
    ///
    /// `Ok(None)` means nothing arrived in time; the chunk may be empty when
    /// the resampler is still buffering.
    fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError>;
}

/// Factory for [`AudioStream`]s.  Shared between the orchestrator and the
/// listener threads.
pub trait AudioSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioStream>, AudioError>;
}

// ---------------------------------------------------------------------------
// MicrophoneSource
// ---------------------------------------------------------------------------

/// The real microphone, via [`AudioCapture`].
pub struct MicrophoneSource {
    device: Option<String>,
}

impl MicrophoneSource {
    /// `device`: input device name, `None` for the system default.
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

impl AudioSource for MicrophoneSource {
    fn open(&self) -> Result<Box<dyn AudioStream>, AudioError> {
        let capture = AudioCapture::open(self.device.as_deref())
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let resampler = StreamResampler::new(capture.sample_rate(), SAMPLE_RATE)
            .map_err(|e| AudioError::Device(e.to_string()))?;

        let (tx, rx) = mpsc::channel();
        let handle = capture
            .start(tx)
            .map_err(|e| AudioError::Device(e.to_string()))?;

        log::debug!(
            "capture: opened input @ {} Hz, {} ch",
            capture.sample_rate(),
            capture.channels()
        );

        Ok(Box::new(MicrophoneStream {
            _handle: handle,
            rx,
            channels: capture.channels(),
            resampler,
        }))
    }
}

struct MicrophoneStream {
    _handle: StreamHandle,
    rx: mpsc::Receiver<CaptureMessage>,
    channels: u16,
    resampler: StreamResampler,
}

impl AudioStream for MicrophoneStream {
    fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(chunk)) => {
                let mono = stereo_to_mono(&chunk.samples, self.channels);
                self.resampler
                    .push(&mono)
                    .map(Some)
                    .map_err(|e| AudioError::Capture(e.to_string()))
            }
            Ok(Err(msg)) => Err(AudioError::Capture(msg)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AudioError::Closed),
        }
    }
}

// ---------------------------------------------------------------------------
// Audio tap
// ---------------------------------------------------------------------------

/// Create a bounded tap holding at most `capacity` chunks.
pub fn tap_channel(capacity: usize) -> (TapSender, TapStream) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (TapSender { tx }, TapStream { rx })
}

/// Recording side of the tap.
pub struct TapSender {
    tx: mpsc::SyncSender<Vec<f32>>,
}

impl TapSender {
    /// Offer a copy of `chunk` to the listener without blocking.  Returns
    /// `false` when the tap is full or the listener is gone.
    pub fn offer(&self, chunk: &[f32]) -> bool {
        self.tx.try_send(chunk.to_vec()).is_ok()
    }
}

/// Listener side of the tap; ends with [`AudioError::Closed`] once the
/// recording drops its sender.
pub struct TapStream {
    rx: mpsc::Receiver<Vec<f32>>,
}

impl AudioStream for TapStream {
    fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError> {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AudioError::Closed),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedSource (test double)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use scripted::{silence, speech, tone, ScriptStep, ScriptedSource};

#[cfg(test)]
mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// One step of a scripted stream.
    #[derive(Debug, Clone)]
    pub enum ScriptStep {
        Chunk(Vec<f32>),
        Fail(String),
    }

    /// `ms` milliseconds of loud audio, as 50 ms chunks.
    pub fn speech(ms: u64) -> Vec<ScriptStep> {
        chunks(ms, 0.5)
    }

    /// `ms` milliseconds of silence, as 50 ms chunks.
    pub fn silence(ms: u64) -> Vec<ScriptStep> {
        chunks(ms, 0.0)
    }

    /// `ms` milliseconds of constant `level`, as 50 ms chunks.
    pub fn tone(ms: u64, level: f32) -> Vec<ScriptStep> {
        chunks(ms, level)
    }

    fn chunks(ms: u64, level: f32) -> Vec<ScriptStep> {
        let per_chunk = (SAMPLE_RATE as usize) / 20;
        let total = (SAMPLE_RATE as u64 * ms / 1000) as usize;
        (0..total.div_ceil(per_chunk))
            .map(|i| {
                let len = per_chunk.min(total - i * per_chunk);
                ScriptStep::Chunk(vec![level; len])
            })
            .collect()
    }

    /// Hands out one script per `open()`.  An exhausted (or missing) script
    /// behaves like a silent room: reads wait briefly and return `None`.
    ///
    /// Streams report their drop back to the source, so tests can check
    /// how many are open at once.
    pub struct ScriptedSource {
        scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
        opens: AtomicUsize,
        live: Arc<AtomicUsize>,
        peak: AtomicUsize,
        unavailable: bool,
    }

    impl ScriptedSource {
        pub fn new(scripts: Vec<Vec<ScriptStep>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                opens: AtomicUsize::new(0),
                live: Arc::new(AtomicUsize::new(0)),
                peak: AtomicUsize::new(0),
                unavailable: false,
            }
        }

        /// A source whose device can never be opened.
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::new(Vec::new())
            }
        }

        pub fn open_count(&self) -> usize {
            self.opens.load(Ordering::SeqCst)
        }

        /// Streams opened and not yet dropped.
        pub fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        /// Most streams that were ever open at the same time.
        pub fn peak_live(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    impl AudioSource for ScriptedSource {
        fn open(&self) -> Result<Box<dyn AudioStream>, AudioError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                return Err(AudioError::Device("scripted device unavailable".into()));
            }
            let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(ScriptedStream {
                steps: steps.into(),
                live: Arc::clone(&self.live),
            }))
        }
    }

    struct ScriptedStream {
        steps: VecDeque<ScriptStep>,
        live: Arc<AtomicUsize>,
    }

    impl Drop for ScriptedStream {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AudioStream for ScriptedStream {
        fn read_chunk(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError> {
            match self.steps.pop_front() {
                Some(ScriptStep::Chunk(c)) => Ok(Some(c)),
                Some(ScriptStep::Fail(msg)) => Err(AudioError::Capture(msg)),
                None => {
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    Ok(None)
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

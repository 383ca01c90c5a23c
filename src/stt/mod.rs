//! Speech-to-text: offline phrase recognition and hosted transcription.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  listener threads                 orchestrator              │
//! │                                                             │
//! │  PhraseRecognizer (trait)         Transcriber (trait)       │
//! │   └─ WhisperRecognizer             └─ DeepgramTranscriber   │
//! │      short clip → Recognition         linear16 → String     │
//! │      (blocking, offline)              (async, "" on error)  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wake and stop phrases are recognized locally so the assistant never
//! streams ambient audio off the machine; only the captured command goes to
//! the transcription service.

pub mod deepgram;
pub mod engine;
pub mod transcribe;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use deepgram::{DeepgramTranscriber, TranscribeError, Transcriber};
pub use engine::{PhraseRecognizer, Recognition, RecognizeError, WhisperRecognizer};
pub use transcribe::{language_code, RecognizeParams, SamplingStrategy, Transcript};

#[cfg(test)]
pub use deepgram::MockTranscriber;
#[cfg(test)]
pub use engine::MockRecognizer;

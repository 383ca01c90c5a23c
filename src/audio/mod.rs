//! Audio plumbing: microphone capture → downmix/resample → 16 kHz mono
//! chunks, plus speaker playback for synthesized replies.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → CaptureMessage (mpsc) → stereo_to_mono
//!           → StreamResampler (rubato) → AudioStream::read_chunk
//!                                             │
//!                        Recording Session ───┤──► TapSender ──► TapStream
//!                                             │                  (stop-word listener)
//!                                             ▼
//!                                      to_linear16 → transcription
//! ```

pub mod capture;
pub mod pcm;
pub mod playback;
pub mod resample;
pub mod source;
pub mod vad;

/// Sample rate every consumer of captured audio works at.
pub const SAMPLE_RATE: u32 = 16_000;

pub use capture::{AudioCapture, AudioChunk, CaptureError, CaptureMessage, StreamHandle};
pub use pcm::{from_f32le, to_linear16};
pub use playback::{play_pcm, PlaybackError};
pub use resample::{resample, stereo_to_mono, ResampleError, StreamResampler};
pub use source::{
    tap_channel, AudioError, AudioSource, AudioStream, MicrophoneSource, TapSender, TapStream,
};
pub use vad::{rms, VadDetector};

#[cfg(test)]
pub use source::{silence, speech, tone, ScriptStep, ScriptedSource};

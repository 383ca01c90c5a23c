//! Speech synthesis and playback of agent replies.
//!
//! ```text
//! Synthesizer::speak(text) ──► PlaybackHandle ──finished().await──► Ok / Err
//!        │                          ▲
//!        └─ fetch audio ─► spawn_blocking(play_pcm) ─► oneshot ─┘
//! ```
//!
//! `speak` returns as soon as the audio is ready and playback has started;
//! the handle resolves when the speaker has played the whole reply.

pub mod cartesia;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

pub use cartesia::{resolve_voice, CartesiaSynthesizer, VOICE_ANA, VOICE_LUCAS};

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("synthesis request timed out")]
    Timeout,

    #[error("synthesis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("synthesis service returned no audio")]
    EmptyAudio,

    #[error("playback failed: {0}")]
    Playback(String),
}

impl From<reqwest::Error> for SynthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthError::Timeout
        } else {
            SynthError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Completion of one playback.
#[derive(Debug)]
pub struct PlaybackHandle {
    done: oneshot::Receiver<Result<(), String>>,
    duration: Duration,
}

impl PlaybackHandle {
    /// A handle plus the sender the player resolves it with.
    pub fn pending(duration: Duration) -> (oneshot::Sender<Result<(), String>>, Self) {
        let (tx, done) = oneshot::channel();
        (tx, Self { done, duration })
    }

    /// A handle that has already finished successfully.
    pub fn completed() -> Self {
        let (tx, handle) = Self::pending(Duration::ZERO);
        let _ = tx.send(Ok(()));
        handle
    }

    /// Length of the audio being played.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wait for playback to end.
    pub async fn finished(self) -> Result<(), SynthError> {
        match self.done.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(SynthError::Playback(msg)),
            Err(_) => Err(SynthError::Playback("player exited without reporting".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<PlaybackHandle, SynthError>;
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use mock::{MockSynthesizer, SpeakBehaviour};


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_handle_resolves_ok() {
        assert!(PlaybackHandle::completed().finished().await.is_ok());
    }

    #[tokio::test]
    async fn dropped_player_is_a_playback_error() {
        let (tx, handle) = PlaybackHandle::pending(Duration::from_secs(1));
        assert_eq!(handle.duration(), Duration::from_secs(1));
        drop(tx);
        assert!(matches!(handle.finished().await, Err(SynthError::Playback(_))));
    }

    #[tokio::test]
    async fn mock_records_text_and_waits_for_playback() {
        let synth = MockSynthesizer::new(SpeakBehaviour::Play(Duration::from_millis(30)));
        let started = std::time::Instant::now();
        let handle = synth.speak("olá").await.unwrap();
        handle.finished().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(synth.spoken(), vec!["olá".to_string()]);
    }
}

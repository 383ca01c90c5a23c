//! Transcription of a captured command via Deepgram's pre-recorded API.
//!
//! The [`Transcriber`] contract is "always returns": any transport, status or
//! parse failure is logged here and surfaces as an empty string, which the
//! orchestrator treats as an empty transcript.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::audio::SAMPLE_RATE;
use crate::config::TranscriptionConfig;

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("transcription request timed out")]
    Timeout,

    #[error("transcription service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TranscribeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranscribeError::Timeout
        } else {
            TranscribeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// `audio` is `linear16` (16-bit LE) mono PCM at 16 kHz.  Returns the
/// transcript, or `""` when nothing could be transcribed.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> String;
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
}

/// Extract the first alternative of the first channel.
fn parse_transcript(body: &str) -> Result<String, TranscribeError> {
    let parsed: ListenResponse =
        serde_json::from_str(body).map_err(|e| TranscribeError::Parse(e.to_string()))?;
    Ok(parsed
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// DeepgramTranscriber
// ---------------------------------------------------------------------------

pub struct DeepgramTranscriber {
    client: reqwest::Client,
    config: TranscriptionConfig,
    api_key: String,
    language: String,
}

impl DeepgramTranscriber {
    /// `locale` is passed through as Deepgram's `language` (e.g. `"pt-BR"`).
    pub fn new(config: &TranscriptionConfig, api_key: impl Into<String>, locale: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            language: locale.to_string(),
        }
    }

    fn listen_url(&self) -> String {
        format!("{}/v1/listen", self.config.base_url.trim_end_matches('/'))
    }

    async fn request(&self, audio: &[u8]) -> Result<String, TranscribeError> {
        let sample_rate = SAMPLE_RATE.to_string();
        let response = self
            .client
            .post(self.listen_url())
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .query(&[
                ("model", self.config.model.as_str()),
                ("language", self.language.as_str()),
                ("encoding", "linear16"),
                ("sample_rate", sample_rate.as_str()),
                ("channels", "1"),
                ("smart_format", "true"),
                ("punctuate", "true"),
                ("paragraphs", "true"),
                ("numerals", "true"),
                ("filler_words", "false"),
            ])
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TranscribeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_transcript(&body)
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> String {
        if audio.is_empty() {
            return String::new();
        }
        let started = std::time::Instant::now();
        match self.request(audio).await {
            Ok(text) => {
                log::debug!(
                    "deepgram: {} bytes transcribed in {:?}",
                    audio.len(),
                    started.elapsed()
                );
                text
            }
            Err(e) => {
                log::error!("deepgram: transcription failed: {e}");
                String::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockTranscriber  (test-only)
// ---------------------------------------------------------------------------

/// Returns a fixed transcript and counts calls.
#[cfg(test)]
pub struct MockTranscriber {
    text: String,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockTranscriber {
    pub fn returning(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> String {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.text.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

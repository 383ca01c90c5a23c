//! Cartesia text-to-speech over `/tts/bytes`.
//!
//! Audio is requested as raw `pcm_f32le` so it can go straight to the
//! speaker without a decoder.

use std::time::Duration;

use async_trait::async_trait;

use super::{PlaybackHandle, SynthError, Synthesizer};
use crate::audio::{from_f32le, play_pcm};
use crate::config::SynthesisConfig;
use crate::stt::language_code;

/// Brazilian Portuguese female voice.
pub const VOICE_ANA: &str = "79a125e8-cd45-4c13-8a67-a188a65c6d09";
/// Brazilian Portuguese male voice.
pub const VOICE_LUCAS: &str = "d6b6e68a-407c-45b0-9330-b96511922666";

/// Voice id for a configured name.  Known names map to their ids, anything
/// shaped like a voice id is used as is, everything else falls back to ana.
pub fn resolve_voice(voice: &str) -> &str {
    match voice.trim().to_lowercase().as_str() {
        "ana" => VOICE_ANA,
        "lucas" => VOICE_LUCAS,
        _ if is_voice_id(voice.trim()) => voice.trim(),
        _ => {
            log::warn!("cartesia: unknown voice '{voice}', using ana");
            VOICE_ANA
        }
    }
}

fn is_voice_id(s: &str) -> bool {
    s.len() == 36
        && s.chars()
            .enumerate()
            .all(|(i, c)| if matches!(i, 8 | 13 | 18 | 23) { c == '-' } else { c.is_ascii_hexdigit() })
}

pub struct CartesiaSynthesizer {
    client: reqwest::Client,
    config: SynthesisConfig,
    api_key: String,
    language: String,
}

impl CartesiaSynthesizer {
    pub fn new(config: &SynthesisConfig, api_key: impl Into<String>, locale: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            language: language_code(locale).unwrap_or_else(|| "pt".into()),
        }
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model_id":   self.config.model,
            "transcript": text,
            "voice": { "mode": "id", "id": resolve_voice(&self.config.voice) },
            "output_format": {
                "container":   "raw",
                "encoding":    "pcm_f32le",
                "sample_rate": self.config.sample_rate
            },
            "language": self.language
        })
    }

    async fn fetch(&self, text: &str) -> Result<Vec<f32>, SynthError> {
        let url = format!("{}/tts/bytes", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", &self.config.api_version)
            .json(&self.request_body(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let samples = from_f32le(&response.bytes().await?);
        if samples.is_empty() {
            return Err(SynthError::EmptyAudio);
        }
        Ok(samples)
    }
}

#[async_trait]
impl Synthesizer for CartesiaSynthesizer {
    async fn speak(&self, text: &str) -> Result<PlaybackHandle, SynthError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SynthError::EmptyText);
        }

        let preview: String = text.chars().take(50).collect();
        log::info!("cartesia: synthesizing '{preview}'");

        let samples = self.fetch(text).await?;
        let rate = self.config.sample_rate;
        let duration = Duration::from_secs_f64(samples.len() as f64 / rate as f64);
        log::debug!("cartesia: {:.1}s of audio", duration.as_secs_f64());

        let (tx, handle) = PlaybackHandle::pending(duration);
        tokio::task::spawn_blocking(move || {
            let result = play_pcm(&samples, rate).map_err(|e| e.to_string());
            let _ = tx.send(result);
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_names_resolve() {
        assert_eq!(resolve_voice("ana"), VOICE_ANA);
        assert_eq!(resolve_voice(" Lucas "), VOICE_LUCAS);
        assert_eq!(resolve_voice("maria"), VOICE_ANA);
        let custom = "0123abcd-0123-4567-89ab-0123456789ab";
        assert_eq!(resolve_voice(custom), custom);
    }

    #[test]
    fn request_asks_for_raw_float_pcm() {
        let synth = CartesiaSynthesizer::new(&SynthesisConfig::default(), "key", "pt-BR");
        let body = synth.request_body("olá");
        assert_eq!(body["transcript"], "olá");
        assert_eq!(body["voice"]["id"], VOICE_ANA);
        assert_eq!(body["output_format"]["encoding"], "pcm_f32le");
        assert_eq!(body["output_format"]["sample_rate"], 24_000);
        assert_eq!(body["language"], "pt");
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let synth = CartesiaSynthesizer::new(&SynthesisConfig::default(), "key", "pt-BR");
        assert!(matches!(synth.speak("  ").await, Err(SynthError::EmptyText)));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error() {
        let cfg = SynthesisConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..SynthesisConfig::default()
        };
        let synth = CartesiaSynthesizer::new(&cfg, "key", "pt-BR");
        assert!(synth.speak("olá").await.is_err());
    }
}

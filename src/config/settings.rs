//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a partial `settings.toml` only
//! needs the keys it wants to change.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// PhraseConfig
// ---------------------------------------------------------------------------

/// Spoken cues that arm the assistant and end a recording.
///
/// Order matters: the first phrase that matches wins, so longer phrases
/// should be listed before their prefixes (`"NERO OUVIR"` before `"NERO"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    /// Phrases that move the session from Idle to Armed.
    pub wake: Vec<String>,
    /// Phrases that end the current recording and trigger dispatch.
    pub stop: Vec<String>,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            wake: vec!["NERO OUVIR".into(), "NERO".into()],
            stop: vec!["NERO ENVIAR".into(), "ENVIAR".into(), "ENVIAR NERO".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// WakeTimeoutPolicy
// ---------------------------------------------------------------------------

/// What the orchestrator does when a finite wake timeout elapses with no
/// wake phrase heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeTimeoutPolicy {
    /// Log the timeout and start listening again.
    Rearm,
    /// Treat the timeout as a shutdown request.
    Shutdown,
}

impl Default for WakeTimeoutPolicy {
    fn default() -> Self {
        Self::Rearm
    }
}

// ---------------------------------------------------------------------------
// ListenerConfig
// ---------------------------------------------------------------------------

/// Settings for the background wake/stop phrase listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// RMS level above which a chunk counts as speech.  Calibration can
    /// only raise it.
    pub energy_threshold: f32,
    /// Ambient noise measured (ms) before the first wake attempt; `0`
    /// skips calibration.
    pub calibrate_ms: u64,
    /// Silence (ms) that closes an utterance segment.
    pub pause_ms: u64,
    /// How long a single wake attempt waits for speech to start.
    pub wake_attempt_secs: u64,
    /// Longest wake utterance handed to the recognizer.
    pub wake_phrase_limit_secs: u64,
    /// How long a single stop attempt waits for speech to start.
    pub stop_attempt_secs: u64,
    /// Longest stop utterance handed to the recognizer.
    pub stop_phrase_limit_secs: u64,
    /// Overall wake deadline; `None` listens forever.
    pub wake_timeout_secs: Option<u64>,
    /// Behaviour once `wake_timeout_secs` elapses.
    pub on_wake_timeout: WakeTimeoutPolicy,
    /// Back-off after a detection error before listening again.
    pub retry_delay_ms: u64,
    /// Upper bound on a single blocking read from the audio feed.
    pub poll_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.015,
            calibrate_ms: 500,
            pause_ms: 800,
            wake_attempt_secs: 5,
            wake_phrase_limit_secs: 10,
            stop_attempt_secs: 5,
            stop_phrase_limit_secs: 5,
            wake_timeout_secs: None,
            on_wake_timeout: WakeTimeoutPolicy::default(),
            retry_delay_ms: 2_000,
            poll_ms: 100,
        }
    }
}

impl ListenerConfig {
    pub fn wake_timeout(&self) -> Option<Duration> {
        self.wake_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Input device selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name; `None` means the system default.
    pub device: Option<String>,
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Settings for a single command recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Hard cap on one recording, in seconds.
    pub max_secs: u64,
    /// Upper bound on a single blocking read while recording, in ms.
    pub poll_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_secs: 600,
            poll_ms: 50,
        }
    }
}

impl RecordingConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

// ---------------------------------------------------------------------------
// TurnConfig
// ---------------------------------------------------------------------------

/// Timing of the per-turn protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Pause between the wake phrase and opening the recording, so the tail
    /// of the wake phrase is not captured.
    pub arm_pause_ms: u64,
    /// How long to wait for the spoken reply after a successful dispatch.
    pub response_timeout_secs: u64,
    /// Pause in Replying before returning to Idle.
    pub reply_pause_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            arm_pause_ms: 500,
            response_timeout_secs: 30,
            reply_pause_ms: 1_000,
        }
    }
}

impl TurnConfig {
    pub fn arm_pause(&self) -> Duration {
        Duration::from_millis(self.arm_pause_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn reply_pause(&self) -> Duration {
        Duration::from_millis(self.reply_pause_ms)
    }
}

// ---------------------------------------------------------------------------
// RecognizerConfig
// ---------------------------------------------------------------------------

/// Settings for the offline Whisper phrase recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// GGML model file stem looked up in the models directory.
    pub model: String,
    /// Explicit model path; overrides `model` when set.
    pub model_path: Option<String>,
    /// CPU threads for inference; `None` picks a sensible default.
    pub threads: Option<i32>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model: "ggml-base".into(),
            model_path: None,
            threads: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptionConfig
// ---------------------------------------------------------------------------

/// Settings for the Deepgram transcription service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub model: String,
    /// Maximum seconds to wait for a transcript.
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepgram.com".into(),
            model: "nova-2".into(),
            timeout_secs: 600,
        }
    }
}

// ---------------------------------------------------------------------------
// SynthesisConfig
// ---------------------------------------------------------------------------

/// Settings for the Cartesia speech synthesis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub base_url: String,
    pub model: String,
    /// Value of the `Cartesia-Version` header.
    pub api_version: String,
    /// Voice name (`"ana"`, `"lucas"`) or a literal voice id.
    pub voice: String,
    /// Sample rate requested from the service, in Hz.
    pub sample_rate: u32,
    /// Longest reply (in characters) read aloud before it is cut.
    pub summary_max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cartesia.ai".into(),
            model: "sonic-multilingual".into(),
            api_version: "2024-06-10".into(),
            voice: "ana".into(),
            sample_rate: 24_000,
            summary_max_chars: 200,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

/// Settings for the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of an OpenAI-compatible API.
    ///
    /// - Ollama default: `http://localhost:11434`
    /// - OpenAI: `https://api.openai.com`
    pub base_url: String,
    /// API key, `None` for local providers.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:7b".into(),
            temperature: 0.3,
            max_tokens: 512,
            timeout_secs: 120,
            system_prompt: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use nero_voice::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Speech locale shared by every collaborator (e.g. `"pt-BR"`).
    pub locale: String,
    pub phrases: PhraseConfig,
    pub listener: ListenerConfig,
    pub audio: AudioConfig,
    pub recording: RecordingConfig,
    pub turn: TurnConfig,
    pub recognizer: RecognizerConfig,
    pub transcription: TranscriptionConfig,
    pub synthesis: SynthesisConfig,
    pub agent: AgentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            locale: "pt-BR".into(),
            phrases: PhraseConfig::default(),
            listener: ListenerConfig::default(),
            audio: AudioConfig::default(),
            recording: RecordingConfig::default(),
            turn: TurnConfig::default(),
            recognizer: RecognizerConfig::default(),
            transcription: TranscriptionConfig::default(),
            synthesis: SynthesisConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.phrases.wake.iter().any(|p| !p.trim().is_empty()) {
            bail!("phrases.wake must contain at least one non-empty phrase");
        }
        if !self.phrases.stop.iter().any(|p| !p.trim().is_empty()) {
            bail!("phrases.stop must contain at least one non-empty phrase");
        }
        if self.locale.trim().is_empty() {
            bail!("locale must not be empty");
        }
        if self.recording.max_secs == 0 {
            bail!("recording.max_secs must be greater than zero");
        }
        if self.turn.response_timeout_secs == 0 {
            bail!("turn.response_timeout_secs must be greater than zero");
        }
        if self.synthesis.summary_max_chars == 0 {
            bail!("synthesis.summary_max_chars must be greater than zero");
        }
        if self.listener.poll_ms == 0 || self.recording.poll_ms == 0 {
            bail!("poll intervals must be greater than zero");
        }
        if self.listener.wake_timeout_secs == Some(0) {
            bail!("listener.wake_timeout_secs must be greater than zero when set");
        }
        Ok(())
    }

    /// Resolved path of the Whisper model used for phrase recognition.
    pub fn recognizer_model_path(&self) -> std::path::PathBuf {
        match &self.recognizer.model_path {
            Some(path) => std::path::PathBuf::from(path),
            None => AppPaths::new()
                .models_dir
                .join(format!("{}.bin", self.recognizer.model)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

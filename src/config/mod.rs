//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for cross-platform data directories, TOML persistence via
//! `AppConfig::load` / `AppConfig::save`, and the environment-backed
//! [`Credentials`].

pub mod credentials;
pub mod paths;
pub mod settings;

pub use credentials::{CredentialError, Credentials};
pub use paths::AppPaths;
pub use settings::{
    AgentConfig, AppConfig, AudioConfig, ListenerConfig, PhraseConfig, RecognizerConfig,
    RecordingConfig, SynthesisConfig, TranscriptionConfig, TurnConfig, WakeTimeoutPolicy,
};

//! Secret credentials for the hosted collaborators.
//!
//! Keys come from the process environment (after `.env` has been loaded by
//! `dotenvy` in `main`).  A missing key is a fatal startup error.

use thiserror::Error;

pub const DEEPGRAM_KEY_VAR: &str = "DEEPGRAM_API_KEY";
pub const CARTESIA_KEY_VAR: &str = "CARTESIA_API_KEY";
pub const AGENT_KEY_VAR: &str = "NERO_AGENT_API_KEY";

/// Prefix used by `.env.example` templates; such values were never filled in.
const PLACEHOLDER_PREFIX: &str = "your_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{0} is not set (add it to your environment or .env file)")]
    Missing(&'static str),
}

/// API keys required to run the assistant.
#[derive(Clone)]
pub struct Credentials {
    pub deepgram_api_key: String,
    pub cartesia_api_key: String,
    /// Optional key for the reasoning service; overrides `agent.api_key`.
    pub agent_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("deepgram_api_key", &"<redacted>")
            .field("cartesia_api_key", &"<redacted>")
            .field("agent_api_key", &self.agent_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            usable(lookup(name)).ok_or(CredentialError::Missing(name))
        };

        Ok(Self {
            deepgram_api_key: required(DEEPGRAM_KEY_VAR)?,
            cartesia_api_key: required(CARTESIA_KEY_VAR)?,
            agent_api_key: usable(lookup(AGENT_KEY_VAR)),
        })
    }
}

fn usable(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.starts_with(PLACEHOLDER_PREFIX))
}

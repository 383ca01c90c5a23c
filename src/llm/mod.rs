//! Reasoning service for the voice assistant.
//!
//! This module provides:
//! * [`ReasoningService`]: async trait the orchestrator dispatches to.
//! * [`ApiAgent`]: OpenAI-compatible chat-completions implementation.
//! * [`ResponseHook`]: the side effect run with the spoken summary of a
//!   successful reply.
//! * [`speakable_summary`] / [`estimate_cost_usd`]: reply helpers.
//! * [`LlmError`]: error variants for agent requests.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use nero_voice::config::AppConfig;
//! use nero_voice::llm::{ApiAgent, ReasoningService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let agent = ApiAgent::from_config(&config.agent, config.synthesis.summary_max_chars);
//!
//!     let result = agent.dispatch("que horas são?").await;
//!     if result.succeeded {
//!         println!("{}", result.response_text);
//!     }
//! }
//! ```

pub mod agent;
pub mod prompt;
pub mod summary;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use agent::{
    ApiAgent, DispatchResult, HookSlot, LlmError, ReasoningService, ResponseHook, ToolInvocation,
};
pub use prompt::{system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use summary::{estimate_cost_usd, estimated_tokens, speakable_summary, truncate_chars};

#[cfg(test)]
pub use agent::MockAgent;

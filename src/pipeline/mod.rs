//! Turn orchestration for the NERO voice assistant.
//!
//! This module wires the wake listener, the Recording Session and the
//! remote collaborators into one loop of turns, and owns the only mutable
//! session state.
//!
//! # Architecture
//!
//! ```text
//! Shutdown ◄── wait_for_signal() (SIGINT / SIGTERM)
//!    │
//!    ▼
//! Orchestrator::run()  ← async tokio task
//!    │
//!    ├─ BackgroundListener (wake)  ──DetectionChannel──▶ Armed
//!    ├─ RecordingSession + BackgroundListener (stop, tap feed)
//!    ├─ Transcriber::transcribe
//!    └─ ReasoningService::dispatch
//!          └─ ReplyHook (own task) ─▶ Synthesizer::speak
//!                 └─ ReplySlot + CompletionSignal ─▶ Orchestrator resumes
//!
//! StateMachine ──watch──▶ subscribers (read-only)
//! ```

pub mod reply;
pub mod runner;
pub mod shutdown;
pub mod signal;
pub mod state;
pub mod turn;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use reply::ReplyHook;
pub use runner::{Collaborators, Orchestrator};
pub use shutdown::{wait_for_signal, Shutdown};
pub use signal::{CompletionSignal, ReplyOutcome, ReplySlot};
pub use state::{SessionState, StateMachine, UnknownState};
pub use turn::{AbortReason, RunStats, TurnError, TurnOutcome, TurnSummary};

//! Session state machine.
//!
//! [`SessionState`] is the five-phase lifecycle of one assistant session.
//! [`StateMachine`] holds the current value and publishes it on a
//! `tokio::sync::watch` channel so observers get a read-only view.
//!
//! The machine only validates that a target is a known state.  Which edges
//! are taken is decided by the orchestrator's call sequence:
//!
//! ```text
//! Idle ──wake phrase──▶ Armed ──pause──▶ Recording ──transcript──▶ Dispatching
//!   ▲                                        │                         │
//!   │                                 empty / failed              signal / timeout
//!   │                                        │                         ▼
//!   └────────────────────────────────────────┴──────────────────── Replying
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing active, listening for the wake phrase.
    #[default]
    Idle,
    /// Wake phrase heard, about to open a recording.
    Armed,
    /// Recording open, accumulating audio until the stop phrase or timeout.
    Recording,
    /// Transcript sent to the reasoning service, awaiting the reply.
    Dispatching,
    /// Reply finished or abandoned; returns to Idle right away.
    Replying,
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        SessionState::Idle,
        SessionState::Armed,
        SessionState::Recording,
        SessionState::Dispatching,
        SessionState::Replying,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Armed => "ARMED",
            SessionState::Recording => "RECORDING",
            SessionState::Dispatching => "DISPATCHING",
            SessionState::Replying => "REPLYING",
        }
    }

    /// One-line description, logged at debug level on every transition.
    pub fn meaning(self) -> &'static str {
        match self {
            SessionState::Idle => "waiting for the wake phrase",
            SessionState::Armed => "wake phrase heard, preparing to record",
            SessionState::Recording => "recording the command",
            SessionState::Dispatching => "waiting for the agent",
            SessionState::Replying => "reply finished",
        }
    }

    /// True while a turn is in progress.
    pub fn is_busy(self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown session state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for SessionState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SessionState::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// Logged, validated holder of the single session state.
///
/// Only the orchestrator owns a `StateMachine`; everything else observes it
/// through [`subscribe`](Self::subscribe).
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<SessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Read-only view that follows every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Move to `target`.  A transition to the current state is a no-op
    /// success.
    pub fn transition(&mut self, target: SessionState) -> bool {
        let from = self.state();
        if from == target {
            return true;
        }
        self.tx.send_replace(target);
        log::info!("pipeline: {from} → {target}");
        log::debug!("pipeline: {}", target.meaning());
        true
    }

    /// Move to the state called `name`.  Unknown names are rejected and
    /// leave the state untouched.
    pub fn transition_named(&mut self, name: &str) -> bool {
        match name.parse::<SessionState>() {
            Ok(target) => self.transition(target),
            Err(e) => {
                log::error!("pipeline: {e}");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

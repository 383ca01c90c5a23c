//! Terminal outcomes of a turn and the running tally.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::listening::DetectionKind;
use crate::recording::EndReason;

/// What one successful turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub transcript: String,
    pub response: String,
    pub tool_count: usize,
    pub estimated_cost_usd: f64,
    pub recording_end: EndReason,
}

/// Normal early exits; not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    EmptyRecording,
    EmptyTranscript,
    EmptyResponse,
    CaptureUnavailable,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbortReason::EmptyRecording => "no audio was captured",
            AbortReason::EmptyTranscript => "nothing was transcribed",
            AbortReason::EmptyResponse => "the agent returned no text",
            AbortReason::CaptureUnavailable => "the microphone could not be opened",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("reasoning failed: {0}")]
    Reasoning(String),

    #[error("no reply within {0:?}")]
    ResponseTimeout(Duration),

    #[error("reply synthesis failed: {0}")]
    Synthesis(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnSummary),
    Aborted(AbortReason),
    Failed(TurnError),
    /// The wake phase ended without a wake phrase (timeout or error).
    NoWake(DetectionKind),
    /// Shutdown was requested before a wake phrase.
    Shutdown,
}

/// Turn counts reported when [`Orchestrator::run`](super::Orchestrator::run)
/// returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub completed: u32,
    pub aborted: u32,
    pub failed: u32,
}

impl RunStats {
    pub fn record(&mut self, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Completed(_) => self.completed += 1,
            TurnOutcome::Aborted(_) => self.aborted += 1,
            TurnOutcome::Failed(_) => self.failed += 1,
            TurnOutcome::NoWake(_) | TurnOutcome::Shutdown => {}
        }
    }

    pub fn turns(&self) -> u32 {
        self.completed + self.aborted + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_count_only_real_turns() {
        let mut stats = RunStats::default();
        stats.record(&TurnOutcome::Aborted(AbortReason::EmptyTranscript));
        stats.record(&TurnOutcome::Failed(TurnError::Reasoning("429".into())));
        stats.record(&TurnOutcome::NoWake(DetectionKind::Timeout));
        stats.record(&TurnOutcome::Shutdown);
        assert_eq!(
            stats,
            RunStats {
                completed: 0,
                aborted: 1,
                failed: 1
            }
        );
        assert_eq!(stats.turns(), 2);
    }

    #[test]
    fn errors_read_well_in_logs() {
        let e = TurnError::ResponseTimeout(Duration::from_secs(30));
        assert_eq!(e.to_string(), "no reply within 30s");
        assert_eq!(AbortReason::EmptyTranscript.to_string(), "nothing was transcribed");
    }
}

//! Recording Session: captures one spoken command.

pub mod session;

pub use session::{EndReason, RecordingOutcome, RecordingSession};

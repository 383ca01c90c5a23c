//! Detection events carried from a listener thread to the orchestrator.

/// What a listener invocation ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionKind {
    WakeWord,
    StopWord,
    /// The overall deadline passed with no matching phrase.
    Timeout,
    /// The audio feed or the recognizer failed.
    Error,
}

/// The single terminal event of one listener invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    pub kind: DetectionKind,
    /// The configured phrase that matched, for WakeWord/StopWord.
    pub matched_phrase: Option<String>,
    /// `linear16` audio of the utterance that matched.
    pub payload: Option<Vec<u8>>,
    /// Failure description, for Error.
    pub error: Option<String>,
}

impl DetectionEvent {
    pub fn detected(kind: DetectionKind, phrase: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            kind,
            matched_phrase: Some(phrase.into()),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: DetectionKind::Timeout,
            matched_phrase: None,
            payload: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: DetectionKind::Error,
            matched_phrase: None,
            payload: None,
            error: Some(message.into()),
        }
    }

    /// True for WakeWord and StopWord.
    pub fn is_match(&self) -> bool {
        matches!(self.kind, DetectionKind::WakeWord | DetectionKind::StopWord)
    }
}

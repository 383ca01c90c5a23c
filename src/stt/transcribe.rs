//! Recognition parameter types and the transcript value.
//!
//! [`RecognizeParams`] carries the settings that control a single Whisper
//! inference run.  [`Transcript`] is what the transcription step hands to
//! the orchestrator.

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Mirrors `whisper_rs::SamplingStrategy` but is owned and `Clone`.
///
/// Wake and stop phrases are short, so greedy decoding is the default.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    Greedy {
        best_of: i32,
    },
    BeamSearch {
        beam_size: i32,
        patience: f32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// RecognizeParams
// ---------------------------------------------------------------------------

/// Parameters for offline phrase recognition.
///
/// ```
/// use nero_voice::stt::RecognizeParams;
///
/// let params = RecognizeParams {
///     n_threads: 2,
///     ..RecognizeParams::default()
/// };
/// assert!(params.suppress_progress);
/// ```
#[derive(Debug, Clone)]
pub struct RecognizeParams {
    pub strategy: SamplingStrategy,
    /// CPU threads handed to Whisper.
    pub n_threads: i32,
    /// Suppress Whisper's progress output to stderr.
    pub suppress_progress: bool,
}

impl Default for RecognizeParams {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
            suppress_progress: true,
        }
    }
}

/// Threads to use for inference, capped at 4: phrase clips are short and
/// the recognizer shares the CPU with capture.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(4) as i32)
        .unwrap_or(2)
}

/// Whisper language code for a BCP-47 style locale (`"pt-BR"` → `"pt"`).
/// `"auto"` or an empty locale lets Whisper detect the language.
pub fn language_code(locale: &str) -> Option<String> {
    let primary = locale
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if primary.is_empty() || primary == "auto" {
        None
    } else {
        Some(primary)
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Text produced from one Recording Outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
        }
    }

    /// Empty transcripts short-circuit the turn back to Idle.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_code_takes_primary_subtag() {
        assert_eq!(language_code("pt-BR").as_deref(), Some("pt"));
        assert_eq!(language_code("en_US").as_deref(), Some("en"));
        assert_eq!(language_code("ES").as_deref(), Some("es"));
        assert_eq!(language_code("auto"), None);
        assert_eq!(language_code(""), None);
    }

    #[test]
    fn transcript_trims_and_reports_empty() {
        assert!(Transcript::new("   \n").is_empty());
        let t = Transcript::new("  que horas são ");
        assert_eq!(t.text, "que horas são");
        assert!(!t.is_empty());
    }

    #[test]
    fn default_params_use_greedy_decoding() {
        let p = RecognizeParams::default();
        assert_eq!(p.strategy, SamplingStrategy::Greedy { best_of: 1 });
        assert!(p.n_threads >= 1 && p.n_threads <= 4);
    }
}

//! Offline phrase recognizer used by the wake/stop listener.
//!
//! [`PhraseRecognizer`] is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn PhraseRecognizer>` and called from listener threads.
//!
//! [`WhisperRecognizer`] is the production implementation that wraps a
//! `whisper_rs::WhisperContext`.  [`MockRecognizer`] (under `#[cfg(test)]`)
//! replays a scripted list of results.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::VadDetector;
use crate::stt::transcribe::{language_code, RecognizeParams, SamplingStrategy};

// ---------------------------------------------------------------------------
// Recognition / RecognizeError
// ---------------------------------------------------------------------------

/// Result of recognizing one utterance segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognition {
    Text(String),
    /// Speech was present but produced no usable text.
    NotUnderstood,
}

/// Hard recognizer failures; these end a listener invocation with an Error
/// event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognizeError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    #[error("Recognition error: {0}")]
    Inference(String),
}

// ---------------------------------------------------------------------------
// PhraseRecognizer trait
// ---------------------------------------------------------------------------

/// `audio` is 16 kHz mono `f32`; `locale` is a tag such as `"pt-BR"`.
pub trait PhraseRecognizer: Send + Sync {
    fn recognize(&self, audio: &[f32], locale: &str) -> Result<Recognition, RecognizeError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn PhraseRecognizer>) {}
};

/// Whisper refuses clips shorter than 1 s; shorter input is zero-padded.
const MIN_SAMPLES: usize = 16_000;
/// Trimming gate; lower than the segmenter's so quiet word edges survive.
const TRIM_THRESHOLD: f32 = 0.005;

// ---------------------------------------------------------------------------
// WhisperRecognizer
// ---------------------------------------------------------------------------

/// A new `WhisperState` is created for every call, so one recognizer can
/// serve the wake and stop listeners without locking.
pub struct WhisperRecognizer {
    ctx: WhisperContext,
    params: RecognizeParams,
    vad: VadDetector,
}

impl std::fmt::Debug for WhisperRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperRecognizer")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs; the model
// weights are read-only after loading.
unsafe impl Send for WhisperRecognizer {}
unsafe impl Sync for WhisperRecognizer {}

impl WhisperRecognizer {
    /// Load a GGML model from `model_path`.
    ///
    /// # Errors
    ///
    /// - [`RecognizeError::ModelNotFound`]: `model_path` does not exist.
    /// - [`RecognizeError::ContextInit`] : whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>, params: RecognizeParams) -> Result<Self, RecognizeError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(RecognizeError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            RecognizeError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| RecognizeError::ContextInit(e.to_string()))?;

        log::info!("recognizer: loaded {}", path.display());
        Ok(Self {
            ctx,
            params,
            vad: VadDetector::new(TRIM_THRESHOLD),
        })
    }

    fn infer(&self, audio: &[f32], language: Option<&str>) -> Result<String, RecognizeError> {
        use whisper_rs::SamplingStrategy as WS;
        let ws = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch { beam_size, patience } => {
                WS::BeamSearch { beam_size, patience }
            }
        };

        let mut fp = FullParams::new(ws);
        fp.set_language(language);
        fp.set_n_threads(self.params.n_threads);
        fp.set_single_segment(true);
        if self.params.suppress_progress {
            fp.set_print_progress(false);
            fp.set_print_realtime(false);
        }

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognizeError::ContextInit(e.to_string()))?;

        state
            .full(fp, audio)
            .map_err(|e| RecognizeError::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| RecognizeError::Inference(e.to_string()))?;

        let mut text = String::new();
        for i in 0..n_segments {
            let seg = state
                .full_get_segment_text(i)
                .map_err(|e| RecognizeError::Inference(format!("segment {i}: {e}")))?;
            text.push_str(&seg);
        }
        Ok(text)
    }
}

impl PhraseRecognizer for WhisperRecognizer {
    fn recognize(&self, audio: &[f32], locale: &str) -> Result<Recognition, RecognizeError> {
        let voiced = self.vad.trim_silence(audio);
        if voiced.is_empty() {
            return Ok(Recognition::NotUnderstood);
        }

        let mut clip = voiced.to_vec();
        if clip.len() < MIN_SAMPLES {
            clip.resize(MIN_SAMPLES, 0.0);
        }

        let language = language_code(locale);
        let raw = self.infer(&clip, language.as_deref())?;
        Ok(to_recognition(&raw))
    }
}

/// Strip Whisper annotations such as `[BLANK_AUDIO]` or `(música)`; a clip
/// with nothing left is not understood.
fn to_recognition(raw: &str) -> Recognition {
    let mut cleaned = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }
    let cleaned = cleaned.trim();
    if cleaned.chars().any(char::is_alphanumeric) {
        Recognition::Text(cleaned.to_string())
    } else {
        Recognition::NotUnderstood
    }
}

// ---------------------------------------------------------------------------
// MockRecognizer  (test-only)
// ---------------------------------------------------------------------------

/// Replays scripted results in order, then reports `NotUnderstood`.
#[cfg(test)]
pub struct MockRecognizer {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Recognition, RecognizeError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockRecognizer {
    pub fn with_results(results: Vec<Result<Recognition, RecognizeError>>) -> Self {
        Self {
            script: std::sync::Mutex::new(results.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Each entry becomes `Ok(Recognition::Text(..))`.
    pub fn texts(texts: &[&str]) -> Self {
        Self::with_results(
            texts
                .iter()
                .map(|t| Ok(Recognition::Text(t.to_string())))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl PhraseRecognizer for MockRecognizer {
    fn recognize(&self, _audio: &[f32], _locale: &str) -> Result<Recognition, RecognizeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Recognition::NotUnderstood))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

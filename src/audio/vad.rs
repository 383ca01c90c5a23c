//! Energy-based Voice Activity Detection (VAD).
//!
//! [`VadDetector`] serves two callers:
//!
//! * the utterance segmenter asks [`VadDetector::is_voice`] whether a live
//!   chunk carries speech, to find speech onset and the closing pause;
//! * the phrase recognizer calls [`VadDetector::trim_silence`] so Whisper
//!   never sees long silent stretches (it hallucinates text on them).
//!
//! ## Algorithm
//!
//! Audio is split into 30 ms frames (480 samples @ 16 kHz).  A frame is
//! classified as *voice* when its RMS amplitude exceeds the configured
//! threshold.
//!
//! [`VadDetector::calibrate`] measures the room's ambient RMS from a live
//! stream so callers can raise that threshold above the noise floor.

use std::time::{Duration, Instant};

use super::source::{AudioError, AudioStream};
use super::SAMPLE_RATE;

/// Frame length used for trimming: 30 ms at 16 kHz.
const DEFAULT_FRAME: usize = 480;

/// Root-mean-square amplitude of `samples`; `0.0` for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mean_sq: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    mean_sq.sqrt()
}

/// Energy gate and silence trimmer.
///
/// ```rust
/// use nero_voice::audio::VadDetector;
///
/// let vad = VadDetector::new(0.01);
///
/// let mut audio = vec![0.0_f32; 480];
/// audio.extend(vec![0.5_f32; 480]);
/// audio.extend(vec![0.0_f32; 480]);
///
/// assert_eq!(vad.trim_silence(&audio).len(), 480);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct VadDetector {
    rms_threshold: f32,
    frame_size: usize,
}

impl VadDetector {
    /// `rms_threshold` is typically `0.01`–`0.02` for a quiet room.
    pub fn new(rms_threshold: f32) -> Self {
        Self {
            rms_threshold,
            frame_size: DEFAULT_FRAME,
        }
    }

    /// Detector with a custom trimming frame; a zero size falls back to
    /// the 30 ms default.
    pub fn with_frame_size(rms_threshold: f32, frame_size: usize) -> Self {
        Self {
            rms_threshold,
            frame_size: if frame_size == 0 { DEFAULT_FRAME } else { frame_size },
        }
    }

    pub fn threshold(&self) -> f32 {
        self.rms_threshold
    }

    /// Whether `chunk` as a whole is louder than the threshold.
    pub fn is_voice(&self, chunk: &[f32]) -> bool {
        !chunk.is_empty() && rms(chunk) > self.rms_threshold
    }

    /// Ambient RMS of `feed` over `window`.
    ///
    /// Reads until `window` worth of samples arrived or `window` of wall
    /// time passed, whichever comes first.  `Ok(None)` when the feed
    /// produced nothing in that time.
    pub fn calibrate(
        feed: &mut dyn AudioStream,
        window: Duration,
        poll: Duration,
    ) -> Result<Option<f32>, AudioError> {
        let wanted = (window.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;
        let started = Instant::now();
        let mut sum_sq = 0.0_f64;
        let mut count = 0_usize;

        while count < wanted && started.elapsed() < window {
            if let Some(chunk) = feed.read_chunk(poll.min(window))? {
                sum_sq += chunk.iter().map(|s| f64::from(*s).powi(2)).sum::<f64>();
                count += chunk.len();
            }
        }

        if count == 0 {
            return Ok(None);
        }
        Ok(Some((sum_sq / count as f64).sqrt() as f32))
    }

    /// Trim leading and trailing silence from `audio`.
    ///
    /// Returns a sub-slice of the original buffer.  If the entire signal is
    /// silent, a zero-length slice is returned.
    pub fn trim_silence<'a>(&self, audio: &'a [f32]) -> &'a [f32] {
        let frames: Vec<&[f32]> = audio.chunks(self.frame_size).collect();

        let Some(first) = frames.iter().position(|f| self.is_voice(f)) else {
            return &audio[0..0];
        };
        let last = frames
            .iter()
            .rposition(|f| self.is_voice(f))
            .unwrap_or(first);

        let start = first * self.frame_size;
        let end = ((last + 1) * self.frame_size).min(audio.len());
        &audio[start..end]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

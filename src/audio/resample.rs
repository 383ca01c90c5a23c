//! Audio resampling and channel mixing utilities.
//!
//! Phrase recognition and transcription both want **16 kHz mono `f32`**
//! audio, while devices usually run at 44.1 or 48 kHz and synthesized speech
//! arrives at 24 kHz.  This module provides:
//!
//! 1. [`stereo_to_mono`]: downmix any number of interleaved channels.
//! 2. [`StreamResampler`]: chunk-at-a-time resampling on top of rubato's
//!    `FftFixedIn`, for live capture where chunk sizes vary.
//! 3. [`resample`]: one-shot conversion of a whole buffer.

use rubato::{FftFixedIn, Resampler};
use thiserror::Error;

/// Input frames handed to rubato per processing step.
const CHUNK_FRAMES: usize = 1024;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("failed to build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; `channels == 0` yields an
/// empty vector.
///
/// ```rust
/// use nero_voice::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, -0.2]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Mono resampler fed with arbitrarily sized chunks.
///
/// Samples are buffered until rubato has a full input block; whatever is
/// left over is flushed (zero-padded) by [`StreamResampler::finish`].  When
/// the two rates are equal the resampler is a pass-through.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self, ResampleError> {
        let inner = if from_rate == to_rate {
            None
        } else {
            Some(FftFixedIn::<f32>::new(
                from_rate as usize,
                to_rate as usize,
                CHUNK_FRAMES,
                2,
                1,
            )?)
        };
        Ok(Self {
            inner,
            pending: Vec::new(),
        })
    }

    /// Feed mono samples; returns whatever output is ready (possibly empty).
    pub fn push(&mut self, mono: &[f32]) -> Result<Vec<f32>, ResampleError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(mono.to_vec());
        };

        self.pending.extend_from_slice(mono);
        let mut out = Vec::new();
        loop {
            let needed = inner.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let block: Vec<f32> = self.pending.drain(..needed).collect();
            let mut processed = inner.process(&[block], None)?;
            if let Some(channel) = processed.pop() {
                out.extend(channel);
            }
        }
        Ok(out)
    }

    /// Flush buffered samples, padding the final block with silence.
    pub fn finish(&mut self) -> Result<Vec<f32>, ResampleError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let block = std::mem::take(&mut self.pending);
        let mut processed = inner.process_partial(Some(&[block]), None)?;
        Ok(processed.pop().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample a complete mono buffer from `from_rate` to `to_rate`.
///
/// The result is truncated to the exact expected length so the padding of
/// the last block does not add trailing silence.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, ResampleError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let expected =
        (samples.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;

    let mut resampler = StreamResampler::new(from_rate, to_rate)?;
    let mut out = resampler.push(samples)?;
    out.extend(resampler.finish()?);
    out.truncate(expected);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Blocking speaker playback via `cpal`.
//!
//! [`play_pcm`] opens the default output device, resamples the buffer to the
//! device rate, and blocks until the output callback has consumed every
//! sample.  Call it from a blocking context (`spawn_blocking`).

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::resample::{resample, ResampleError};

/// Extra time allowed beyond the clip length before playback counts as stalled.
const STALL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Resample(#[from] ResampleError),

    #[error("playback stalled after {0:?}")]
    Stalled(Duration),
}

/// Play mono `samples` recorded at `sample_rate` Hz; returns once the device
/// has pulled the whole buffer.
pub fn play_pcm(samples: &[f32], sample_rate: u32) -> Result<(), PlaybackError> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(PlaybackError::NoDevice)?;
    let supported = device.default_output_config()?;
    let channels = supported.channels().max(1) as usize;
    let out_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let buffer = resample(samples, sample_rate, out_rate)?;
    let clip_len = Duration::from_secs_f64(buffer.len() as f64 / out_rate as f64);

    let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
    let mut pos = 0usize;
    let mut finished = false;

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = buffer.get(pos).copied().unwrap_or(0.0);
                frame.fill(value);
                pos += 1;
            }
            if pos >= buffer.len() && !finished {
                finished = true;
                let _ = done_tx.try_send(());
            }
        },
        |err: cpal::StreamError| {
            log::error!("playback: cpal stream error: {err}");
        },
        None,
    )?;
    stream.play()?;

    let limit = clip_len + STALL_GRACE;
    done_rx
        .recv_timeout(limit)
        .map_err(|_| PlaybackError::Stalled(limit))?;
    Ok(())
}

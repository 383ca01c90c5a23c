//! Utterance segmentation: the "listen" half of listen-then-recognize.
//!
//! ```text
//!   waiting ──voice──► speaking ──pause of silence──► Speech(samples)
//!      │                  └──────phrase limit───────► Speech(samples)
//!      └──onset timeout──► NoSpeech
//! ```
//!
//! Silence is counted in samples so that bursts of buffered audio segment
//! the same way as live audio.  When the feed goes quiet (`read_chunk`
//! returns `None`), wall-clock time since the last voiced chunk stands in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::audio::{AudioError, AudioStream, VadDetector, SAMPLE_RATE};

/// Limits for one segmentation attempt.
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    pub energy_threshold: f32,
    /// Silence that closes the utterance.
    pub pause: Duration,
    /// How long to wait for speech to begin.
    pub onset_timeout: Duration,
    /// Longest utterance returned.
    pub phrase_limit: Duration,
    /// Upper bound on one blocking read; also bounds cancellation latency.
    pub poll: Duration,
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Speech(Vec<f32>),
    /// No voice within the onset timeout.
    NoSpeech,
    Cancelled,
    /// The feed ended for good.
    Closed,
    /// The feed reported a failure.
    Failed(String),
}

fn samples_for(d: Duration) -> usize {
    (d.as_secs_f64() * SAMPLE_RATE as f64) as usize
}

/// Read from `feed` until one utterance is complete.
pub fn next_segment(feed: &mut dyn AudioStream, cfg: &SegmentConfig, cancel: &AtomicBool) -> Segment {
    let vad = VadDetector::new(cfg.energy_threshold);
    let pause_samples = samples_for(cfg.pause).max(1);
    let limit_samples = samples_for(cfg.phrase_limit).max(1);

    let started = Instant::now();
    let mut speech: Vec<f32> = Vec::new();
    let mut speaking = false;
    let mut trailing_silence = 0usize;
    let mut last_voice = started;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Segment::Cancelled;
        }

        let chunk = match feed.read_chunk(cfg.poll) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                if speaking && last_voice.elapsed() >= cfg.pause {
                    return Segment::Speech(speech);
                }
                if !speaking && started.elapsed() >= cfg.onset_timeout {
                    return Segment::NoSpeech;
                }
                continue;
            }
            Err(AudioError::Closed) => {
                if speaking {
                    return Segment::Speech(speech);
                }
                return Segment::Closed;
            }
            Err(e) => return Segment::Failed(e.to_string()),
        };

        if chunk.is_empty() {
            continue;
        }

        let voiced = vad.is_voice(&chunk);
        if !speaking {
            if !voiced {
                if started.elapsed() >= cfg.onset_timeout {
                    return Segment::NoSpeech;
                }
                continue;
            }
            speaking = true;
        }

        speech.extend_from_slice(&chunk);
        if voiced {
            trailing_silence = 0;
            last_voice = Instant::now();
        } else {
            trailing_silence += chunk.len();
        }

        if trailing_silence >= pause_samples || speech.len() >= limit_samples {
            return Segment::Speech(speech);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{silence, speech, tap_channel, AudioSource, ScriptStep, ScriptedSource};

    fn cfg() -> SegmentConfig {
        SegmentConfig {
            energy_threshold: 0.05,
            pause: Duration::from_millis(100),
            onset_timeout: Duration::from_millis(60),
            phrase_limit: Duration::from_millis(1_000),
            poll: Duration::from_millis(10),
        }
    }

    fn run(script: Vec<ScriptStep>) -> Segment {
        let source = ScriptedSource::new(vec![script]);
        let mut stream = source.open().unwrap();
        next_segment(stream.as_mut(), &cfg(), &AtomicBool::new(false))
    }

    #[test]
    fn speech_closed_by_pause_in_samples() {
        let script = [silence(100), speech(300), silence(200), speech(200)].concat();
        match run(script) {
            // 300 ms of speech plus the 100 ms of silence that closed it.
            Segment::Speech(s) => assert_eq!(s.len(), 6_400),
            other => panic!("expected speech, got {other:?}"),
        }
    }

    #[test]
    fn speech_closed_by_wall_clock_when_feed_goes_quiet() {
        match run(speech(200)) {
            Segment::Speech(s) => assert_eq!(s.len(), 3_200),
            other => panic!("expected speech, got {other:?}"),
        }
    }

    #[test]
    fn phrase_limit_caps_the_segment() {
        match run(speech(2_000)) {
            Segment::Speech(s) => assert_eq!(s.len(), 16_000),
            other => panic!("expected speech, got {other:?}"),
        }
    }

    #[test]
    fn silence_only_is_no_speech() {
        assert_eq!(run(Vec::new()), Segment::NoSpeech);
    }

    #[test]
    fn feed_failure_is_reported() {
        let script = vec![ScriptStep::Fail("unplugged".into())];
        assert!(matches!(run(script), Segment::Failed(msg) if msg.contains("unplugged")));
    }

    #[test]
    fn closed_feed_flushes_pending_speech() {
        let (tx, mut rx) = tap_channel(8);
        tx.offer(&[0.5; 800]);
        drop(tx);
        let seg = next_segment(&mut rx, &cfg(), &AtomicBool::new(false));
        assert_eq!(seg, Segment::Speech(vec![0.5; 800]));

        let seg = next_segment(&mut rx, &cfg(), &AtomicBool::new(false));
        assert_eq!(seg, Segment::Closed);
    }

    #[test]
    fn cancel_flag_wins() {
        let source = ScriptedSource::new(vec![speech(500)]);
        let mut stream = source.open().unwrap();
        let seg = next_segment(stream.as_mut(), &cfg(), &AtomicBool::new(true));
        assert_eq!(seg, Segment::Cancelled);
    }
}

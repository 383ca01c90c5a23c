//! Dedicated OS-thread listener.
//!
//! Device reads and offline recognition both block, so each invocation of
//! [`PhraseDetector::detect`] runs on its own thread.  [`BackgroundListener`]
//! owns that thread and a cancel flag:
//!
//! * the thread emits at most one event, after it has released its audio
//!   feed, and never emits once cancelled;
//! * dropping the handle cancels without joining, so a stop-word listener
//!   can be left to wind down on its own;
//! * [`BackgroundListener::join`] cancels and waits without blocking the
//!   async executor, which the orchestrator uses before it reopens the
//!   capture device.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crate::audio::{AudioSource, AudioStream, TapStream};

use super::channel::DetectionSender;
use super::detector::{ListenMode, PhraseDetector};
use super::event::DetectionEvent;
use super::phrases::PhraseSet;

/// Where a listener reads audio from.
pub enum ListenerFeed {
    /// Open the capture device on the listener thread (wake phase).
    Device(Arc<dyn AudioSource>),
    /// Chunks shared by an active Recording Session (stop phase).
    Tap(TapStream),
}

/// Handle to a running listener thread.
pub struct BackgroundListener {
    cancel: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    mode: ListenMode,
}

impl BackgroundListener {
    /// Spawn a listener that delivers its single event through `tx`.
    pub fn spawn(
        detector: Arc<PhraseDetector>,
        feed: ListenerFeed,
        mode: ListenMode,
        phrases: PhraseSet,
        timeout: Option<Duration>,
        tx: DetectionSender,
    ) -> std::io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = Arc::clone(&cancel);

        let thread = std::thread::Builder::new()
            .name(format!("{}-listener", mode.label()))
            .spawn(move || {
                let event = listen(&detector, feed, mode, &phrases, timeout, &cancel_clone);
                match event {
                    Some(ev) if !cancel_clone.load(Ordering::Relaxed) => {
                        if !tx.emit(ev) {
                            log::debug!("listener: {} event dropped, receiver gone", mode.label());
                        }
                    }
                    _ => log::debug!("listener: {} listener exited without event", mode.label()),
                }
            })?;

        Ok(Self {
            cancel,
            thread: Some(thread),
            mode,
        })
    }

    /// Ask the thread to stop at its next read.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Cancel and wait for the thread to exit.
    pub async fn join(mut self) {
        self.cancel();
        let Some(thread) = self.thread.take() else {
            return;
        };
        let mode = self.mode;
        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => log::error!("listener: {} listener thread panicked", mode.label()),
            Err(e) => log::error!("listener: failed to join {} listener: {e}", mode.label()),
        }
    }
}

impl Drop for BackgroundListener {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel();
        }
    }
}

/// Open the feed, detect, and drop the feed before returning.
fn listen(
    detector: &PhraseDetector,
    feed: ListenerFeed,
    mode: ListenMode,
    phrases: &PhraseSet,
    timeout: Option<Duration>,
    cancel: &AtomicBool,
) -> Option<DetectionEvent> {
    let mut stream: Box<dyn AudioStream> = match feed {
        ListenerFeed::Device(source) => match source.open() {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("listener: cannot open audio for {} phrase: {e}", mode.label());
                return Some(DetectionEvent::error(e.to_string()));
            }
        },
        ListenerFeed::Tap(tap) => Box::new(tap),
    };
    detector.detect(stream.as_mut(), mode, phrases, timeout, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{speech, tap_channel, ScriptedSource};
    use crate::listening::channel::detection_channel;
    use crate::listening::detector::test_segment_config;
    use crate::listening::event::DetectionKind;
    use crate::stt::MockRecognizer;

    fn detector(texts: &[&str]) -> Arc<PhraseDetector> {
        Arc::new(PhraseDetector::new(
            Arc::new(MockRecognizer::texts(texts)),
            "pt-BR",
            test_segment_config(),
            test_segment_config(),
        ))
    }

    #[tokio::test]
    async fn device_listener_delivers_wake_event() {
        let source: Arc<dyn AudioSource> = Arc::new(ScriptedSource::new(vec![speech(200)]));
        let (tx, mut rx) = detection_channel();

        let listener = BackgroundListener::spawn(
            detector(&["nero ouvir"]),
            ListenerFeed::Device(source),
            ListenMode::Wake,
            PhraseSet::new(["NERO OUVIR"]),
            None,
            tx,
        )
        .unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, DetectionKind::WakeWord);
        listener.join().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_listener_emits_nothing() {
        let source: Arc<dyn AudioSource> = Arc::new(ScriptedSource::new(Vec::new()));
        let (tx, mut rx) = detection_channel();

        let listener = BackgroundListener::spawn(
            detector(&[]),
            ListenerFeed::Device(source),
            ListenMode::Wake,
            PhraseSet::new(["NERO"]),
            None,
            tx,
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        listener.join().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unavailable_device_is_an_error_event() {
        let source: Arc<dyn AudioSource> = Arc::new(ScriptedSource::unavailable());
        let (tx, mut rx) = detection_channel();

        let _listener = BackgroundListener::spawn(
            detector(&[]),
            ListenerFeed::Device(source),
            ListenMode::Wake,
            PhraseSet::new(["NERO"]),
            None,
            tx,
        )
        .unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, DetectionKind::Error);
    }

    #[tokio::test]
    async fn tap_listener_hears_stop_word() {
        let (tap_tx, tap_rx) = tap_channel(16);
        let (tx, mut rx) = detection_channel();

        let _listener = BackgroundListener::spawn(
            detector(&["pode enviar"]),
            ListenerFeed::Tap(tap_rx),
            ListenMode::Stop,
            PhraseSet::new(["ENVIAR"]),
            None,
            tx,
        )
        .unwrap();

        for _ in 0..4 {
            assert!(tap_tx.offer(&[0.5; 800]));
        }

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, DetectionKind::StopWord);
        assert_eq!(ev.matched_phrase.as_deref(), Some("ENVIAR"));
        drop(tap_tx);
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels_the_thread() {
        let source: Arc<dyn AudioSource> = Arc::new(ScriptedSource::new(Vec::new()));
        let (tx, mut rx) = detection_channel();

        let listener = BackgroundListener::spawn(
            detector(&[]),
            ListenerFeed::Device(source),
            ListenMode::Wake,
            PhraseSet::new(["NERO"]),
            None,
            tx,
        )
        .unwrap();
        drop(listener);

        // The thread notices the flag within one poll and closes the channel.
        let closed = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(closed, Ok(None)));
    }
}

//! The Detection Channel: single-producer, single-consumer, single-event.
//!
//! The sender is consumed by [`DetectionSender::emit`], so a listener
//! invocation cannot deliver more than one event.  The receiver can be
//! awaited (wake phase) or polled without blocking (stop phase, from inside
//! the recording loop).

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::event::DetectionEvent;

/// Create a connected sender/receiver pair.
pub fn detection_channel() -> (DetectionSender, DetectionReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (DetectionSender { tx }, DetectionReceiver { rx })
}

/// Producer half, owned by a listener thread.
#[derive(Debug)]
pub struct DetectionSender {
    tx: mpsc::Sender<DetectionEvent>,
}

impl DetectionSender {
    /// Deliver the one terminal event.  Must be called from a non-async
    /// thread.  Returns `false` when the receiver is gone.
    pub fn emit(self, event: DetectionEvent) -> bool {
        self.tx.blocking_send(event).is_ok()
    }
}

/// Outcome of a non-blocking poll.
#[derive(Debug, PartialEq, Eq)]
pub enum TryDetection {
    Ready(DetectionEvent),
    /// Nothing yet; the listener is still running.
    Empty,
    /// The listener exited without emitting.
    Closed,
}

/// Consumer half, owned by the orchestrator or the recording loop.
#[derive(Debug)]
pub struct DetectionReceiver {
    rx: mpsc::Receiver<DetectionEvent>,
}

impl DetectionReceiver {
    /// Wait for the event; `None` when the listener exited without one.
    pub async fn recv(&mut self) -> Option<DetectionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> TryDetection {
        match self.rx.try_recv() {
            Ok(ev) => TryDetection::Ready(ev),
            Err(TryRecvError::Empty) => TryDetection::Empty,
            Err(TryRecvError::Disconnected) => TryDetection::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listening::event::DetectionKind;

    #[tokio::test]
    async fn event_crosses_from_thread_to_async() {
        let (tx, mut rx) = detection_channel();
        std::thread::spawn(move || {
            assert!(tx.emit(DetectionEvent::detected(DetectionKind::StopWord, "ENVIAR", vec![])));
        });

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, DetectionKind::StopWord);
        // The sender was consumed, so the channel is now closed.
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn try_recv_reports_empty_ready_and_closed() {
        let (tx, mut rx) = detection_channel();
        assert_eq!(rx.try_recv(), TryDetection::Empty);

        let handle = std::thread::spawn(move || tx.emit(DetectionEvent::timeout()));
        assert!(handle.join().unwrap());

        assert_eq!(rx.try_recv(), TryDetection::Ready(DetectionEvent::timeout()));
        assert_eq!(rx.try_recv(), TryDetection::Closed);
    }

    #[test]
    fn emit_after_receiver_dropped_returns_false() {
        let (tx, rx) = detection_channel();
        drop(rx);
        let handle = std::thread::spawn(move || tx.emit(DetectionEvent::timeout()));
        assert!(!handle.join().unwrap());
    }

    #[tokio::test]
    async fn sender_dropped_without_emitting_closes_channel() {
        let (tx, mut rx) = detection_channel();
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}

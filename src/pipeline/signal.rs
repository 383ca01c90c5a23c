//! Completion Signal and the reply result slot.
//!
//! The reply hook runs on its own task, spawned by the reasoning service.
//! It may only touch two things the orchestrator owns:
//!
//! ```text
//!   reply hook task                               orchestrator
//!   ───────────────                               ────────────
//!   epoch = CompletionSignal::epoch()             epoch = CompletionSignal::reset()
//!   ReplySlot::put(epoch, outcome) ──────┐
//!   CompletionSignal::signal(epoch) ─────┼─watch─▶ CompletionSignal::wait(timeout)
//!                                        └───────▶ ReplySlot::take(epoch)
//! ```
//!
//! Every [`reset`](CompletionSignal::reset) starts a new epoch.  A hook that
//! outlives its turn still carries the old epoch, so its late `signal` and
//! `put` are dropped instead of completing the next turn.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

// ---------------------------------------------------------------------------
// CompletionSignal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cycle {
    epoch: u64,
    signalled: bool,
}

/// Single-shot, resettable flag awaited across tasks.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<Cycle>>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Cycle::default());
        Self { tx: Arc::new(tx) }
    }

    /// Back to pending under a fresh epoch, which is returned.
    pub fn reset(&self) -> u64 {
        let mut epoch = 0;
        self.tx.send_modify(|cycle| {
            cycle.epoch = cycle.epoch.wrapping_add(1);
            cycle.signalled = false;
            epoch = cycle.epoch;
        });
        epoch
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Mark `epoch` signalled.  Returns `false` when it already was or when
    /// `epoch` is no longer current.
    pub fn signal(&self, epoch: u64) -> bool {
        self.tx.send_if_modified(|cycle| {
            if cycle.epoch != epoch || cycle.signalled {
                return false;
            }
            cycle.signalled = true;
            true
        })
    }

    pub fn is_signalled(&self) -> bool {
        self.tx.borrow().signalled
    }

    /// Wait until the current epoch is signalled or `timeout` passes.
    /// Returns whether the signal arrived in time; the flag itself is left
    /// as it is.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let epoch = rx.borrow().epoch;
        let arrived = matches!(
            tokio::time::timeout(
                timeout,
                rx.wait_for(|cycle| cycle.epoch == epoch && cycle.signalled)
            )
            .await,
            Ok(Ok(_))
        );
        arrived
    }
}

// ---------------------------------------------------------------------------
// ReplySlot
// ---------------------------------------------------------------------------

/// How the reply hook finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Spoken,
    Failed(String),
}

/// The single result the reply hook may write, tagged with its epoch.
#[derive(Debug, Clone, Default)]
pub struct ReplySlot {
    inner: Arc<Mutex<Option<(u64, ReplyOutcome)>>>,
}

impl ReplySlot {
    fn with<R>(&self, f: impl FnOnce(&mut Option<(u64, ReplyOutcome)>) -> R) -> R {
        match self.inner.lock() {
            Ok(mut slot) => f(&mut slot),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn put(&self, epoch: u64, outcome: ReplyOutcome) {
        self.with(|slot| *slot = Some((epoch, outcome)));
    }

    /// Remove and return the outcome stored for `epoch`.  An outcome left
    /// by another epoch is discarded.
    pub fn take(&self, epoch: u64) -> Option<ReplyOutcome> {
        self.with(|slot| match slot.take() {
            Some((stored, outcome)) if stored == epoch => Some(outcome),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.with(|slot| *slot = None);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn wait_without_signal_times_out_after_the_deadline() {
        let signal = CompletionSignal::new();
        signal.reset();
        let started = Instant::now();
        assert!(!signal.wait(Duration::from_millis(100)).await);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(600));
        assert!(!signal.is_signalled());
    }

    #[tokio::test]
    async fn double_signal_behaves_like_one() {
        let signal = CompletionSignal::new();
        let epoch = signal.reset();
        assert!(signal.signal(epoch));
        assert!(!signal.signal(epoch));

        let started = Instant::now();
        assert!(signal.wait(Duration::from_secs(5)).await);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn signal_from_another_task_wakes_the_waiter() {
        let signal = CompletionSignal::new();
        let epoch = signal.reset();
        let writer = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            writer.signal(epoch);
        });
        assert!(signal.wait(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn signal_from_a_plain_thread_wakes_the_waiter() {
        let signal = CompletionSignal::new();
        let writer = signal.clone();
        let epoch = signal.epoch();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.signal(epoch);
        });
        assert!(signal.wait(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn reset_rearms() {
        let signal = CompletionSignal::new();
        let first = signal.reset();
        signal.signal(first);
        let second = signal.reset();
        assert_ne!(first, second);
        assert!(!signal.is_signalled());
        assert!(!signal.wait(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn late_signal_from_an_earlier_epoch_is_ignored() {
        let signal = CompletionSignal::new();
        let stale = signal.reset();
        let current = signal.reset();

        let writer = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(!writer.signal(stale));
        });
        assert!(!signal.wait(Duration::from_millis(150)).await);
        assert!(!signal.is_signalled());

        assert!(signal.signal(current));
        assert!(signal.wait(Duration::from_millis(50)).await);
    }

    #[test]
    fn slot_is_taken_once() {
        let slot = ReplySlot::default();
        assert_eq!(slot.take(1), None);
        slot.clone().put(1, ReplyOutcome::Failed("no audio".into()));
        assert_eq!(slot.take(1), Some(ReplyOutcome::Failed("no audio".into())));
        assert_eq!(slot.take(1), None);
    }

    #[test]
    fn slot_drops_outcomes_from_other_epochs() {
        let slot = ReplySlot::default();
        slot.put(3, ReplyOutcome::Spoken);
        assert_eq!(slot.take(4), None);
        assert_eq!(slot.take(3), None);

        slot.put(4, ReplyOutcome::Spoken);
        slot.clear();
        assert_eq!(slot.take(4), None);
    }
}

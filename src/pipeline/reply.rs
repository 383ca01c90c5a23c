//! Response hook that speaks the agent's reply.
//!
//! Registered once on the reasoning service.  It writes the reply slot
//! before raising the completion signal, and it signals on failure too, so
//! the orchestrator never waits out the full timeout for a reply that
//! already failed.  Both writes carry the epoch that was current when the
//! reply arrived, so a reply still playing after its turn gave up cannot
//! complete the next one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::ResponseHook;
use crate::tts::Synthesizer;

use super::signal::{CompletionSignal, ReplyOutcome, ReplySlot};

pub struct ReplyHook {
    synthesizer: Arc<dyn Synthesizer>,
    signal: CompletionSignal,
    slot: ReplySlot,
}

impl ReplyHook {
    pub fn new(synthesizer: Arc<dyn Synthesizer>, signal: CompletionSignal, slot: ReplySlot) -> Self {
        Self {
            synthesizer,
            signal,
            slot,
        }
    }

    async fn speak(&self, summary: &str) -> ReplyOutcome {
        let handle = match self.synthesizer.speak(summary).await {
            Ok(handle) => handle,
            Err(e) => return ReplyOutcome::Failed(e.to_string()),
        };
        log::debug!("pipeline: playing {:.1}s reply", handle.duration().as_secs_f64());
        match handle.finished().await {
            Ok(()) => ReplyOutcome::Spoken,
            Err(e) => ReplyOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl ResponseHook for ReplyHook {
    async fn on_response(&self, summary: String) {
        let epoch = self.signal.epoch();
        let outcome = self.speak(&summary).await;
        if let ReplyOutcome::Failed(reason) = &outcome {
            log::error!("pipeline: reply playback failed: {reason}");
        }
        if self.signal.epoch() != epoch {
            log::debug!("pipeline: reply from an abandoned turn finished, ignoring it");
            return;
        }
        self.slot.put(epoch, outcome);
        self.signal.signal(epoch);
    }
}

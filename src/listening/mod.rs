//! Background wake/stop phrase listening.
//!
//! # Hand-off
//!
//! ```text
//!  listener thread (blocking)                 orchestrator (async)
//!  ──────────────────────────                 ────────────────────
//!  open feed ─► next_segment ─► recognize
//!       ▲                          │
//!       └──── no match ◄───────────┤
//!                                  ▼
//!                  drop feed, DetectionSender::emit(event)
//!                                  │   (exactly once, consumes sender)
//!                                  ▼
//!                         DetectionReceiver::recv().await   (wake phase)
//!                         DetectionReceiver::try_recv()     (stop phase)
//! ```

pub mod channel;
pub mod detector;
pub mod event;
pub mod listener;
pub mod phrases;
pub mod segment;

pub use channel::{detection_channel, DetectionReceiver, DetectionSender, TryDetection};
pub use detector::{ListenMode, PhraseDetector};
pub use event::{DetectionEvent, DetectionKind};
pub use listener::{BackgroundListener, ListenerFeed};
pub use phrases::{normalize, PhraseSet};
pub use segment::{next_segment, Segment, SegmentConfig};

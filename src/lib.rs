//! NERO: a wake-word driven voice assistant.
//!
//! ```text
//! microphone ─▶ listening (wake) ─▶ recording (+ stop listener) ─▶ stt
//!                                                                   │
//!            speaker ◀─ tts ◀─ reply hook ◀─ llm agent ◀────────────┘
//! ```
//!
//! [`pipeline::Orchestrator`] drives the turns; every other module is a
//! collaborator it reaches through a trait.

pub mod audio;
pub mod config;
pub mod listening;
pub mod llm;
pub mod pipeline;
pub mod recording;
pub mod stt;
pub mod tts;

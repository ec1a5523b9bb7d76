//! In-memory stores for overlay state
//!
//! Each store owns its collection behind its own lock, so contention is
//! scoped per store. Operations follow one pattern: mutate under the lock,
//! copy the resulting value, release the lock, then hand the event to the
//! hub. No store ever holds its lock across a broadcast.
//!
//! Every successful mutation bumps the store's revision counter, which the
//! autosave task uses to skip snapshots when nothing changed.

pub mod quests;
pub mod requests;
pub mod tts;

pub use quests::QuestStore;
pub use requests::{mask_phone, RequestSnapshot, RequestStore};
pub use tts::{TtsSnapshot, TtsStore};

//! # Stream Overlay Common Library
//!
//! Shared code for the stream overlay workspace including:
//! - Domain models (quests, call/board requests, spoken-text items, catalog definitions)
//! - Outbound display events (OverlayEvent enum) and the wire envelope
//! - Error types
//! - Configuration loading
//! - Time helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use events::OverlayEvent;

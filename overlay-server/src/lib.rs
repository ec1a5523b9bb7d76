//! # Stream Overlay Server Library (overlay-server)
//!
//! Moderation queues, quest progress and display fan-out for a live-stream
//! overlay.
//!
//! **Architecture:** three independently locked stores (quests, call/board
//! requests, spoken-text items) publish [`overlay_common::OverlayEvent`]s
//! through a [`hub::Hub`] to every connected display WebSocket. A
//! [`persistence::PersistenceGateway`] snapshots the stores to one JSON file, and a
//! [`history::DonationLedger`] keeps an append-only donation record.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod hub;
pub mod persistence;
pub mod state;
pub mod store;

pub use api::build_router;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

//! HTTP control surface and display WebSocket

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{build_router, run};

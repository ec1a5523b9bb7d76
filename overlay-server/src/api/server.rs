//! HTTP server setup and routing

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use overlay_common::{Error, Result};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{handlers, ws};
use crate::state::AppState;

/// Build the application router
///
/// Unmatched paths fall through to static files under `web_root`.
pub fn build_router(state: AppState, web_root: &Path) -> Router {
    Router::new()
        // Service
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::health))
        .route("/ws", get(ws::display_socket))
        .route("/api/debug/clients", get(handlers::debug_clients))

        // Catalog and direct broadcasts
        .route("/api/catalog", get(handlers::get_catalog))
        .route("/api/catalog/reload", post(handlers::reload_catalog))
        .route("/api/ability/fire", get(handlers::fire_ability))
        .route("/api/donation", get(handlers::send_donation))
        .route("/api/test/tts", get(handlers::test_tts))

        // Quests
        .route("/api/quest/add", get(handlers::quest_add))
        .route("/api/quest/active", get(handlers::quest_active))
        .route("/api/quest/inc", post(handlers::quest_inc))
        .route("/api/quest/reset", post(handlers::quest_reset))
        .route("/api/quest/remove", post(handlers::quest_remove))

        // TTS moderation
        .route("/api/tts/submit", get(handlers::tts_submit))
        .route("/api/tts/queue", get(handlers::tts_queue))
        .route("/api/tts/approve", post(handlers::tts_approve))
        .route("/api/tts/reject", post(handlers::tts_reject))

        // Request moderation
        .route("/api/request/submit", get(handlers::request_submit))
        .route("/api/request/queue", get(handlers::request_queue))
        .route("/api/request/active", get(handlers::request_active))
        .route("/api/request/approve", post(handlers::request_approve))
        .route("/api/request/reject", post(handlers::request_reject))
        .route("/api/request/complete", post(handlers::request_complete))

        // Persistence
        .route("/api/state/save", post(handlers::state_save))
        .route("/api/state/rehydrate", post(handlers::state_rehydrate))

        // Donation history
        .route("/api/donations", post(handlers::record_donation))

        .fallback_service(ServeDir::new(web_root))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves
///
/// In-flight requests finish before this returns. Display sockets are not
/// drained; their sessions end when the runtime shuts down.
pub async fn run<F>(
    state: AppState,
    web_root: &Path,
    addr: SocketAddr,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let hub = Arc::clone(&state.hub);
    let app = build_router(state, web_root);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!(
        "HTTP server stopped ({} display clients still connected)",
        hub.clients_count().await
    );
    Ok(())
}

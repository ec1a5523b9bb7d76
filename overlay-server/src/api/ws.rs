//! Display client WebSocket endpoint

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures::StreamExt;
use std::sync::Arc;

use crate::hub::run_session;
use crate::state::AppState;

/// GET /ws - upgrade and join the broadcast hub
pub async fn display_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.keepalive.max_message_size)
        .on_upgrade(move |socket| handle_display_socket(socket, state))
}

async fn handle_display_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    run_session(sink, stream, Arc::clone(&state.hub), state.keepalive.clone()).await;
}

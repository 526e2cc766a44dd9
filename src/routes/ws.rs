//! WebSocket handshake — identity check, registration, task spawn.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade request arrives with `?id=<identity>`
//! 2. Upgrade completes; an empty identity gets an immediate close frame
//!    and never touches the registry
//! 3. Outbound queue created, client registered with the hub
//! 4. Writer task spawned; reader runs on the connection task
//! 5. Reader exit → unregister → queue close → writer sends close and exits

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::info;

use crate::client;
use crate::envelope::Envelope;
use crate::state::AppState;

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = params.get("id").cloned().unwrap_or_default();
    ws.max_message_size(client::MAX_FRAME_BYTES)
        .on_upgrade(move |socket| run_connection(socket, state, identity))
}

async fn run_connection(mut socket: WebSocket, state: AppState, identity: String) {
    if identity.is_empty() {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    let (outbound_tx, outbound_rx) = mpsc::channel::<Envelope>(client::OUTBOUND_QUEUE_CAPACITY);
    let token = state.hub.register(identity.clone(), outbound_tx).await;
    info!(%token, identity, "ws: client connected");

    let (sink, stream) = socket.split();
    tokio::spawn(client::write_pump(sink, outbound_rx));
    client::read_pump(stream, state.hub.clone(), token, identity.clone()).await;

    info!(%token, identity, "ws: client disconnected");
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

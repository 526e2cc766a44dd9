//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three surfaces under one Axum router: the websocket fan-out endpoint at
//! `/ws`, the Spotify subsystem under `/spotify`, and a pair of trivial
//! root/health endpoints. `/ws` is guarded by an upgrade check so plain GET
//! requests get a clear 426 instead of a handshake failure.

pub mod spotify;
pub mod ws;

use axum::Router;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/healthz", get(healthz))
        .route("/ws", get(ws::handle_ws).layer(middleware::from_fn(require_upgrade)))
        .route("/spotify/auth", get(spotify::auth))
        .route("/spotify/playback", get(spotify::playback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject non-upgrade requests to the websocket endpoint before the
/// handshake handler runs.
async fn require_upgrade(req: Request, next: Next) -> Response {
    let is_upgrade = req
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if is_upgrade {
        next.run(req).await
    } else {
        (StatusCode::UPGRADE_REQUIRED, "websocket upgrade required").into_response()
    }
}

async fn hello() -> &'static str {
    "Hello, World!"
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

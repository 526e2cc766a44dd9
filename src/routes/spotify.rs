//! Spotify HTTP handlers — OAuth callback/redirect and playback proxy.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use std::collections::HashMap;
use tracing::warn;

use crate::services::spotify;
use crate::state::AppState;

/// OAuth entry point and callback, on one route:
/// - `?error=...` — provider denied the authorization; echo it back
/// - `?code=...`  — exchange for tokens and persist them
/// - otherwise    — redirect the user to Spotify's authorize page
pub async fn auth(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let Some(config) = &state.spotify else {
        return not_configured();
    };

    if let Some(auth_error) = params.get("error") {
        return Json(auth_error.clone()).into_response();
    }

    if let Some(code) = params.get("code") {
        return match spotify::exchange_code(config, code).await {
            Ok(credentials) => match state.credentials.save(&credentials) {
                Ok(()) => (StatusCode::CREATED, "Saved new credentials").into_response(),
                Err(e) => internal_error(&e),
            },
            Err(e) => internal_error(&e),
        };
    }

    Redirect::temporary(&config.authorize_url()).into_response()
}

/// Currently-playing proxy backed by the saved credentials.
pub async fn playback(State(state): State<AppState>) -> Response {
    let Some(config) = &state.spotify else {
        return not_configured();
    };

    match spotify::current_playback(config, &state.credentials).await {
        Ok(playback) => Json(playback).into_response(),
        Err(e) => internal_error(&e),
    }
}

fn internal_error(e: &spotify::SpotifyError) -> Response {
    warn!(error = %e, "spotify request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

fn not_configured() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "spotify is not configured").into_response()
}

//! Spotify service — OAuth code exchange, token refresh, playback fetch.
//!
//! DESIGN
//! ======
//! Single-user authorization-code flow. Tokens are persisted to a JSON file
//! on disk and reloaded per request; there is exactly one set of saved
//! credentials. The playback fetch retries once with a refreshed access
//! token when Spotify answers 401.
//!
//! This subsystem shares no state with the hub.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

const ACCOUNTS_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
const CURRENTLY_PLAYING_URL: &str = "https://api.spotify.com/v1/me/player/currently-playing";

const OAUTH_SCOPE: &str = "user-read-playback-state";

// =============================================================================
// TYPES
// =============================================================================

/// OAuth application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl SpotifyConfig {
    /// Load from `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET`,
    /// `SPOTIFY_REDIRECT_URI`. Returns `None` if any are missing (the
    /// subsystem will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID").ok()?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("SPOTIFY_REDIRECT_URI").ok()?;
        Some(Self { client_id, client_secret, redirect_uri })
    }

    /// Build the Spotify authorization URL the user is redirected to.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        format!(
            "{AUTHORIZE_URL}?response_type=code&client_id={}&redirect_uri={}&scope={OAUTH_SCOPE}",
            self.client_id, self.redirect_uri
        )
    }
}

/// The credential pair persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCredentials {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    #[serde(default)]
    error: String,
}

/// What the playback endpoint returns; a trimmed view of Spotify's
/// currently-playing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub timestamp: i64,
    #[serde(default)]
    pub progress_ms: i64,
    pub is_playing: bool,
    #[serde(default)]
    pub item: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum SpotifyError {
    #[error("spotify request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("spotify oauth error: {0}")]
    OAuth(String),
    #[error("credentials file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed credentials file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("saved credentials are missing or incomplete")]
    MissingCredentials,
    #[error("unexpected playback response: {0}")]
    Playback(String),
}

// =============================================================================
// CREDENTIALS STORE
// =============================================================================

/// File-backed store for the single saved credential pair.
#[derive(Debug, Clone)]
pub struct CredentialsStore {
    path: PathBuf,
}

impl CredentialsStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load saved credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or holds empty
    /// tokens.
    pub fn load(&self) -> Result<SavedCredentials, SpotifyError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let credentials: SavedCredentials = serde_json::from_str(&raw)?;
        if credentials.access_token.is_empty() || credentials.refresh_token.is_empty() {
            return Err(SpotifyError::MissingCredentials);
        }
        Ok(credentials)
    }

    /// Persist credentials, replacing any previous pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, credentials: &SavedCredentials) -> Result<(), SpotifyError> {
        let json = serde_json::to_string(credentials)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

// =============================================================================
// TOKEN FLOW
// =============================================================================

/// Exchange an authorization code for a credential pair.
///
/// # Errors
///
/// Returns an error if the token endpoint is unreachable or rejects the code.
pub async fn exchange_code(config: &SpotifyConfig, code: &str) -> Result<SavedCredentials, SpotifyError> {
    let body = request_token(
        config,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )
    .await?;
    let credentials = parse_token_response(&body, None)?;
    info!("obtained new spotify credentials");
    Ok(credentials)
}

/// Trade a refresh token for a fresh credential pair. Spotify may omit the
/// refresh token from the response, in which case the old one is kept.
///
/// # Errors
///
/// Returns an error if the token endpoint is unreachable or rejects the
/// refresh token.
pub async fn refresh_tokens(config: &SpotifyConfig, refresh_token: &str) -> Result<SavedCredentials, SpotifyError> {
    let body = request_token(
        config,
        &[("grant_type", "refresh_token"), ("refresh_token", refresh_token)],
    )
    .await?;
    let credentials = parse_token_response(&body, Some(refresh_token))?;
    info!("refreshed spotify credentials");
    Ok(credentials)
}

async fn request_token(config: &SpotifyConfig, form: &[(&str, &str)]) -> Result<String, SpotifyError> {
    let client = reqwest::Client::new();
    let resp = client
        .post(ACCOUNTS_TOKEN_URL)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .form(form)
        .send()
        .await?;
    Ok(resp.text().await?)
}

/// Parse the token endpoint's response body. `fallback_refresh` covers the
/// refresh-grant case where Spotify omits a new refresh token.
fn parse_token_response(body: &str, fallback_refresh: Option<&str>) -> Result<SavedCredentials, SpotifyError> {
    let token: TokenResponse = match serde_json::from_str(body) {
        Ok(token) => token,
        Err(_) => return Err(oauth_error(body)),
    };
    if token.access_token.is_empty() {
        return Err(oauth_error(body));
    }
    let refresh_token = if token.refresh_token.is_empty() {
        match fallback_refresh {
            Some(previous) => previous.to_string(),
            None => return Err(oauth_error(body)),
        }
    } else {
        token.refresh_token
    };
    Ok(SavedCredentials { access_token: token.access_token, refresh_token })
}

fn oauth_error(body: &str) -> SpotifyError {
    let parsed: OAuthErrorResponse = serde_json::from_str(body).unwrap_or(OAuthErrorResponse { error: String::new() });
    if parsed.error.is_empty() {
        SpotifyError::OAuth(format!("unexpected response: {body}"))
    } else {
        SpotifyError::OAuth(parsed.error)
    }
}

// =============================================================================
// PLAYBACK
// =============================================================================

/// Fetch the currently-playing state using saved credentials, refreshing
/// them once on a 401.
///
/// # Errors
///
/// Returns an error if no credentials are saved, the refresh fails, or the
/// playback response cannot be parsed.
pub async fn current_playback(
    config: &SpotifyConfig,
    store: &CredentialsStore,
) -> Result<PlaybackResponse, SpotifyError> {
    let credentials = store.load()?;
    let client = reqwest::Client::new();

    let resp = fetch_playback(&client, &credentials.access_token).await?;
    let resp = if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
        let refreshed = refresh_tokens(config, &credentials.refresh_token).await?;
        store.save(&refreshed)?;
        fetch_playback(&client, &refreshed.access_token).await?
    } else {
        resp
    };

    if !resp.status().is_success() {
        return Err(SpotifyError::Playback(format!("status {}", resp.status())));
    }
    Ok(resp.json::<PlaybackResponse>().await?)
}

async fn fetch_playback(client: &reqwest::Client, access_token: &str) -> Result<reqwest::Response, SpotifyError> {
    Ok(client
        .get(CURRENTLY_PLAYING_URL)
        .bearer_auth(access_token)
        .send()
        .await?)
}

#[cfg(test)]
#[path = "spotify_test.rs"]
mod tests;

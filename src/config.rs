//! Environment-derived configuration.
//!
//! DESIGN
//! ======
//! Everything comes from the process environment, optionally seeded from a
//! `.env` file loaded in `main`. Missing optional values fall back to
//! defaults; the Spotify subsystem is wholly optional and simply disabled
//! when its variables are absent.

use std::path::PathBuf;

use crate::services::spotify::SpotifyConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CREDENTIALS_PATH: &str = "spotify_credentials.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub spotify: Option<SpotifyConfig>,
    pub credentials_path: PathBuf,
}

impl Config {
    /// Assemble configuration from `PORT`, `SPOTIFY_CREDENTIALS_PATH`, and
    /// the `SPOTIFY_*` OAuth variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            spotify: SpotifyConfig::from_env(),
            credentials_path: std::env::var("SPOTIFY_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

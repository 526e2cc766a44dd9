//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! carries a handle to the hub loop and the Spotify subsystem's config and
//! credentials store. The hub itself is not here — only its handle; the
//! registry lives exclusively inside the hub task.

use crate::hub::HubHandle;
use crate::services::spotify::{CredentialsStore, SpotifyConfig};

/// Shared application state. Clone is required by Axum — all inner fields
/// are cheaply cloneable handles.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    /// `None` when the Spotify env vars are not configured; the subsystem's
    /// routes report unavailable but the service still boots.
    pub spotify: Option<SpotifyConfig>,
    pub credentials: CredentialsStore,
}

impl AppState {
    #[must_use]
    pub fn new(hub: HubHandle, spotify: Option<SpotifyConfig>, credentials: CredentialsStore) -> Self {
        Self { hub, spotify, credentials }
    }
}

mod client;
mod config;
mod envelope;
mod hub;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    // Optional .env for local development.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::Config::from_env();

    if config.spotify.is_none() {
        tracing::warn!("SPOTIFY_* env vars not set — spotify routes disabled");
    }

    let (hub, handle) = hub::Hub::new();
    tokio::spawn(hub.run());

    let credentials = services::spotify::CredentialsStore::new(config.credentials_path.clone());
    let state = state::AppState::new(handle, config.spotify.clone(), credentials);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "relay listening");
    axum::serve(listener, app).await.expect("server failed");
}

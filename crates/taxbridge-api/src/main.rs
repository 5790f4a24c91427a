//! # taxbridge-api: Binary Entry Point
//!
//! Reads configuration from the environment, connects the optional
//! database, seeds the directory and serves the API.

use taxbridge_api::state::{AppConfig, AppState, DirectorySeed};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env();
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, every request acts as the service administrator");
    }
    let port = config.port;

    // Absent DATABASE_URL means in-memory only.
    let db_pool = taxbridge_api::db::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;

    let state = AppState::with_config(config, db_pool);

    if let Some(path) = state.config.directory_file.clone() {
        let seed = DirectorySeed::load(&path).map_err(|e| {
            tracing::error!("{e}");
            e
        })?;
        let (customers, users) = seed.apply(&state.directory);
        tracing::info!(customers, users, path = %path.display(), "directory seeded");
    }

    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let app = taxbridge_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("TaxBridge API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

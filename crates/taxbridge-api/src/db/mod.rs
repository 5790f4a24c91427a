//! # Database Persistence Layer
//!
//! Optional Postgres persistence for credential documents via SQLx.
//!
//! When `DATABASE_URL` is set, every accepted mutation is written through
//! and the in-memory store is hydrated on startup. When absent, the API
//! runs in-memory only (development and tests).
//!
//! Documents are stored whole, sensitive fields still sealed, in a JSONB
//! column. The remaining columns are indexed copies for operators.

pub mod credentials;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. \
                 Credentials will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

//! # taxbridge-api: HTTP Service for the Credential Registry
//!
//! Axum routes over [`taxbridge_vault::CredentialRegistry`]. Handlers parse
//! and validate input, call the registry with the caller's identity, write
//! accepted changes through to Postgres, and wrap results in the
//! `{ success, message, data }` envelope.
//!
//! ## API Surface
//!
//! | Route                                              | Module                     |
//! |----------------------------------------------------|----------------------------|
//! | `/v1/credentials`, `/v1/credentials/:id`           | [`routes::credentials`]    |
//! | `/v1/credentials/customer/:customer_number`        | [`routes::credentials`]    |
//! | `/v1/credentials/accountant/:accountant_id`        | [`routes::credentials`]    |
//! | `/v1/credentials/:id/logs`                         | [`routes::credentials`]    |
//! | `/v1/credentials/:id/delegations[/:user_id]`       | [`routes::delegations`]    |
//! | `/v1/credentials/graph`, `/v1/credentials/:id/graph` | [`routes::graph`]        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated by utoipa at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::credentials::router())
        .merge(routes::delegations::router())
        .merge(routes::graph::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}

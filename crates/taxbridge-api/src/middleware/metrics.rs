//! # Request Metrics
//!
//! In-process request and error counters, reported through `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Shared counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    client_error_count: Arc<AtomicU64>,
    server_error_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    /// Fresh counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.client_error_count.load(Ordering::Relaxed)
            + self.server_error_count.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status.
    pub fn server_errors(&self) -> u64 {
        self.server_error_count.load(Ordering::Relaxed)
    }
}

/// Count the request and its outcome, then log the running totals.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let total = m.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        let status = response.status();
        if status.is_server_error() {
            m.server_error_count.fetch_add(1, Ordering::Relaxed);
        } else if status.is_client_error() {
            m.client_error_count.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(
            %method,
            path = %path,
            status = status.as_u16(),
            requests = total,
            errors = m.errors(),
            "request completed"
        );
    }

    response
}

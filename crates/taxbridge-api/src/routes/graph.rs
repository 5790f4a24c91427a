//! # Access Graph API
//!
//! Graph exports for visualization. The full graph is filtered to what the
//! caller can see; the neighborhood view requires view access and is
//! recorded in the credential's access log.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use taxbridge_core::CredentialId;
use taxbridge_vault::{AccessGraph, CredentialNeighborhood};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Build the graph router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/credentials/graph", get(full_graph))
        .route("/v1/credentials/:id/graph", get(credential_graph))
}

/// GET /v1/credentials/graph: Nodes and edges of every visible credential.
#[utoipa::path(
    get,
    path = "/v1/credentials/graph",
    responses(
        (status = 200, description = "Access graph with statistics"),
    ),
    tag = "graph"
)]
async fn full_graph(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Json<ApiResponse<AccessGraph>> {
    let graph = state.registry.full_graph(&caller.context());
    Json(ApiResponse::ok("Access graph generated", graph))
}

/// GET /v1/credentials/:id/graph: One credential and its neighbors.
#[utoipa::path(
    get,
    path = "/v1/credentials/{id}/graph",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Credential neighborhood"),
        (status = 403, description = "Not visible to the caller", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "graph"
)]
async fn credential_graph(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CredentialNeighborhood>>, AppError> {
    let id = CredentialId::from_uuid(id);
    let neighborhood = state.registry.neighborhood(&caller.context(), &id)?;
    state.persist_access_log(&id).await;
    Ok(Json(ApiResponse::ok("Credential graph generated", neighborhood)))
}

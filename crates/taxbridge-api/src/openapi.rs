//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the credential API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TaxBridge Credential API",
        version = "0.1.0",
        description = "SRI credential registry: encrypted storage, role-based access, delegations, access logs and access-graph export."
    ),
    paths(
        // Credentials
        crate::routes::credentials::create_credential,
        crate::routes::credentials::list_credentials,
        crate::routes::credentials::get_credential,
        crate::routes::credentials::update_credential,
        crate::routes::credentials::delete_credential,
        crate::routes::credentials::credentials_by_customer,
        crate::routes::credentials::credentials_by_accountant,
        crate::routes::credentials::access_logs,
        // Delegations
        crate::routes::delegations::add_delegation,
        crate::routes::delegations::revoke_delegation,
        // Graph
        crate::routes::graph::full_graph,
        crate::routes::graph::credential_graph,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::credentials::CreateCredentialRequest,
        crate::routes::credentials::CreatedCredential,
        crate::routes::credentials::UpdateCredentialRequest,
        crate::routes::delegations::CreateDelegationRequest,
    )),
    tags(
        (name = "credentials", description = "Credential records and access logs"),
        (name = "delegations", description = "Time-limited delegated access"),
        (name = "graph", description = "Access graph export"),
    )
)]
pub struct ApiDoc;

/// Serves the spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in [
            "/v1/credentials",
            "/v1/credentials/{id}",
            "/v1/credentials/customer/{customer_number}",
            "/v1/credentials/accountant/{accountant_id}",
            "/v1/credentials/{id}/logs",
            "/v1/credentials/{id}/delegations",
            "/v1/credentials/{id}/delegations/{user_id}",
            "/v1/credentials/graph",
            "/v1/credentials/{id}/graph",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }
    }
}

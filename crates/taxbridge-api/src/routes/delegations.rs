//! # Delegation API
//!
//! Grant and revoke time-limited access to a credential. Callers need edit
//! access on the credential.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use taxbridge_core::{CredentialId, Permission, UserId, ValidationError};
use taxbridge_vault::{DelegationChange, DelegationReceipt, DelegationRequest};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Request to delegate access to another user.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateDelegationRequest {
    pub delegated_to_id: Option<Uuid>,
    /// `view` and/or `edit`. Defaults to `["view"]`.
    pub permissions: Option<Vec<String>>,
    /// Must lie in the future.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validate for CreateDelegationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.delegated_to_id.is_none() {
            return Err("delegated_to_id is required".into());
        }
        if self.expires_at.is_none() {
            return Err("expires_at is required".into());
        }
        Ok(())
    }
}

impl CreateDelegationRequest {
    fn into_request(self) -> Result<DelegationRequest, AppError> {
        let (Some(delegated_to), Some(expires_at)) = (self.delegated_to_id, self.expires_at) else {
            return Err(AppError::validation("delegated_to_id and expires_at are required"));
        };
        let permissions = self
            .permissions
            .map(|labels| {
                labels
                    .iter()
                    .map(|p| p.parse::<Permission>())
                    .collect::<Result<Vec<_>, ValidationError>>()
            })
            .transpose()?;
        Ok(DelegationRequest {
            delegated_to: UserId::from_uuid(delegated_to),
            permissions,
            expires_at,
        })
    }
}

/// Build the delegations router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/credentials/:id/delegations", post(add_delegation))
        .route(
            "/v1/credentials/:id/delegations/:user_id",
            delete(revoke_delegation),
        )
}

/// POST /v1/credentials/:id/delegations: Add or refresh a delegation.
#[utoipa::path(
    post,
    path = "/v1/credentials/{id}/delegations",
    params(("id" = Uuid, Path, description = "Credential ID")),
    request_body = CreateDelegationRequest,
    responses(
        (status = 201, description = "Delegation created"),
        (status = 200, description = "Existing delegation updated"),
        (status = 403, description = "Caller lacks edit access", body = crate::error::ErrorBody),
        (status = 404, description = "Credential or delegatee not found", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "delegations"
)]
async fn add_delegation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<CreateDelegationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<DelegationReceipt>>), AppError> {
    let id = CredentialId::from_uuid(id);
    let request = extract_validated_json(body)?.into_request()?;
    let before = state.snapshot(&id);
    let receipt = state
        .registry
        .add_delegation(&caller.context(), &id, request)?;
    state.commit(&id, before).await?;

    let (status, message) = match receipt.change {
        DelegationChange::Created => (StatusCode::CREATED, "Delegation created successfully"),
        DelegationChange::Updated => (StatusCode::OK, "Delegation updated successfully"),
    };
    Ok((status, Json(ApiResponse::ok(message, receipt))))
}

/// DELETE /v1/credentials/:id/delegations/:user_id: Revoke a delegation.
#[utoipa::path(
    delete,
    path = "/v1/credentials/{id}/delegations/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Credential ID"),
        ("user_id" = Uuid, Path, description = "Delegatee user ID"),
    ),
    responses(
        (status = 200, description = "Delegation revoked"),
        (status = 403, description = "Caller lacks edit access", body = crate::error::ErrorBody),
        (status = 404, description = "Credential or active delegation not found", body = crate::error::ErrorBody),
    ),
    tag = "delegations"
)]
async fn revoke_delegation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = CredentialId::from_uuid(id);
    let before = state.snapshot(&id);
    state
        .registry
        .revoke_delegation(&caller.context(), &id, UserId::from_uuid(user_id))?;
    state.commit(&id, before).await?;
    Ok(Json(ApiResponse::ok("Delegation revoked successfully", ())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_default_to_none_and_parse() {
        let req = CreateDelegationRequest {
            delegated_to_id: Some(Uuid::new_v4()),
            permissions: Some(vec!["view".into(), "edit".into()]),
            expires_at: Some(Utc::now() + chrono::Duration::days(7)),
        };
        assert!(req.validate().is_ok());
        let request = req.into_request().unwrap();
        assert_eq!(request.permissions, Some(vec![Permission::View, Permission::Edit]));
    }

    #[test]
    fn unknown_permission_rejected() {
        let req = CreateDelegationRequest {
            delegated_to_id: Some(Uuid::new_v4()),
            permissions: Some(vec!["admin".into()]),
            expires_at: Some(Utc::now()),
        };
        assert!(matches!(
            req.into_request(),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn missing_delegatee_rejected() {
        let req = CreateDelegationRequest {
            expires_at: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap_err(), "delegated_to_id is required");
    }
}

//! # Credential API
//!
//! Credential CRUD, lookups by customer and accountant, and access log
//! reads. Every handler delegates authorization to the registry and writes
//! accepted changes through to the database.

use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxbridge_core::{
    CredentialId, CustomerNumber, Ruc, TaxpayerType, UserId, ValidationError,
};
use taxbridge_vault::{
    AccessLogPage, Credential, CredentialPatch, CredentialStatus, NewCredential, SafeCredential,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, require, Validate};
use crate::response::ApiResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request to register a credential for an existing customer.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CreateCredentialRequest {
    pub customer_number: String,
    pub sri_username: String,
    pub sri_password: String,
    /// 13-digit RUC.
    pub tax_id: String,
    /// `individual`, `corporate` or `simplified_regime`.
    pub taxpayer_type: String,
    pub accountant_id: Option<Uuid>,
    pub legal_name: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Validate for CreateCredentialRequest {
    fn validate(&self) -> Result<(), String> {
        require("customer_number", &self.customer_number)?;
        require("sri_username", &self.sri_username)?;
        require("sri_password", &self.sri_password)?;
        require("tax_id", &self.tax_id)?;
        require("taxpayer_type", &self.taxpayer_type)
    }
}

impl CreateCredentialRequest {
    fn into_new_credential(self) -> Result<NewCredential, ValidationError> {
        Ok(NewCredential {
            customer_number: CustomerNumber::new(self.customer_number)?,
            tax_id: Ruc::new(self.tax_id)?,
            taxpayer_type: TaxpayerType::from_str(&self.taxpayer_type)?,
            sri_username: self.sri_username,
            sri_password: self.sri_password,
            accountant_id: self.accountant_id.map(UserId::from_uuid),
            legal_name: self.legal_name,
            notes: self.notes,
            expires_at: self.expires_at,
        })
    }
}

/// Summary returned after creation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedCredential {
    pub id: Uuid,
    pub credential_number: String,
    pub customer_number: String,
    pub customer_name: String,
    pub tax_id: String,
    pub taxpayer_type: String,
    pub assigned_accountant_name: Option<String>,
    pub status: String,
}

impl From<&Credential> for CreatedCredential {
    fn from(c: &Credential) -> Self {
        Self {
            id: *c.id.as_uuid(),
            credential_number: c.credential_number.to_string(),
            customer_number: c.customer_number.to_string(),
            customer_name: c.customer_name.clone(),
            tax_id: c.tax_id.to_string(),
            taxpayer_type: c.taxpayer_type.to_string(),
            assigned_accountant_name: c.assigned_accountant_name.clone(),
            status: c.status.to_string(),
        }
    }
}

/// Partial update. Omitted fields are left untouched; an empty
/// `legal_name` or `notes` clears the field.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct UpdateCredentialRequest {
    pub sri_username: Option<String>,
    pub sri_password: Option<String>,
    pub taxpayer_type: Option<String>,
    pub legal_name: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// `active`, `inactive`, `expired` or `revoked`.
    pub status: Option<String>,
    pub assigned_accountant: Option<Uuid>,
}

impl Validate for UpdateCredentialRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(username) = &self.sri_username {
            require("sri_username", username)?;
        }
        if let Some(password) = &self.sri_password {
            require("sri_password", password)?;
        }
        Ok(())
    }
}

impl UpdateCredentialRequest {
    fn into_patch(self) -> Result<CredentialPatch, ValidationError> {
        Ok(CredentialPatch {
            taxpayer_type: self
                .taxpayer_type
                .as_deref()
                .map(TaxpayerType::from_str)
                .transpose()?,
            status: self
                .status
                .as_deref()
                .map(CredentialStatus::from_str)
                .transpose()?,
            sri_username: self.sri_username,
            sri_password: self.sri_password,
            legal_name: self.legal_name,
            notes: self.notes,
            expires_at: self.expires_at,
            assigned_accountant: self.assigned_accountant.map(UserId::from_uuid),
        })
    }
}

/// Listing filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListCredentialsQuery {
    /// Only return credentials with this status.
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the credentials router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/credentials",
            get(list_credentials).post(create_credential),
        )
        .route(
            "/v1/credentials/:id",
            get(get_credential)
                .put(update_credential)
                .delete(delete_credential),
        )
        .route(
            "/v1/credentials/customer/:customer_number",
            get(credentials_by_customer),
        )
        .route(
            "/v1/credentials/accountant/:accountant_id",
            get(credentials_by_accountant),
        )
        .route("/v1/credentials/:id/logs", get(access_logs))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/credentials: Register a credential.
#[utoipa::path(
    post,
    path = "/v1/credentials",
    request_body = CreateCredentialRequest,
    responses(
        (status = 201, description = "Credential created"),
        (status = 404, description = "Customer or accountant not found", body = crate::error::ErrorBody),
        (status = 409, description = "RUC already has an active credential", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn create_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateCredentialRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedCredential>>), AppError> {
    let input = extract_validated_json(body)?.into_new_credential()?;
    let credential = state.registry.create(&caller.context(), input)?;
    state.commit(&credential.id, None).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Credential created successfully",
            CreatedCredential::from(&credential),
        )),
    ))
}

/// GET /v1/credentials: Credentials visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/credentials",
    params(ListCredentialsQuery),
    responses(
        (status = 200, description = "Credentials visible to the caller"),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn list_credentials(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListCredentialsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<SafeCredential>>>, AppError> {
    let query = extract_query(query)?;
    let status = query
        .status
        .as_deref()
        .map(CredentialStatus::from_str)
        .transpose()?;
    let credentials = state.registry.list(&caller.context(), status);
    Ok(Json(ApiResponse::list("Credentials retrieved", credentials)))
}

/// GET /v1/credentials/:id: Credential detail (password withheld).
#[utoipa::path(
    get,
    path = "/v1/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Credential found"),
        (status = 403, description = "Not visible to the caller", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn get_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SafeCredential>>, AppError> {
    let id = CredentialId::from_uuid(id);
    let credential = state.registry.get(&caller.context(), &id)?;
    state.persist_access_log(&id).await;
    Ok(Json(ApiResponse::ok("Credential retrieved", credential)))
}

/// PUT /v1/credentials/:id: Partial update.
#[utoipa::path(
    put,
    path = "/v1/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    request_body = UpdateCredentialRequest,
    responses(
        (status = 200, description = "Credential updated"),
        (status = 403, description = "Caller lacks edit access", body = crate::error::ErrorBody),
        (status = 404, description = "Credential or accountant not found", body = crate::error::ErrorBody),
        (status = 409, description = "RUC already has an active credential", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn update_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateCredentialRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SafeCredential>>, AppError> {
    let id = CredentialId::from_uuid(id);
    let patch = extract_validated_json(body)?.into_patch()?;
    let before = state.snapshot(&id);
    let credential = state.registry.update(&caller.context(), &id, patch)?;
    state.commit(&id, before).await?;
    Ok(Json(ApiResponse::ok("Credential updated successfully", credential)))
}

/// DELETE /v1/credentials/:id: Hard delete (admin only).
#[utoipa::path(
    delete,
    path = "/v1/credentials/{id}",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Credential deleted"),
        (status = 403, description = "Caller is not an administrator", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn delete_credential(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let id = CredentialId::from_uuid(id);
    let before = state.snapshot(&id);
    state.registry.delete(&caller.context(), &id)?;
    state.forget(&id, before).await?;
    Ok(Json(ApiResponse::ok("Credential deleted successfully", ())))
}

/// GET /v1/credentials/customer/:customer_number: Credentials of one customer.
#[utoipa::path(
    get,
    path = "/v1/credentials/customer/{customer_number}",
    params(("customer_number" = String, Path, description = "Customer number")),
    responses(
        (status = 200, description = "Credentials of the customer visible to the caller"),
        (status = 403, description = "None visible to the caller", body = crate::error::ErrorBody),
        (status = 404, description = "Customer has no credentials", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn credentials_by_customer(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(customer_number): Path<String>,
) -> Result<Json<ApiResponse<Vec<SafeCredential>>>, AppError> {
    let number = CustomerNumber::new(customer_number)?;
    let credentials = state
        .registry
        .find_by_customer_number(&caller.context(), &number)?;
    for credential in &credentials {
        state.persist_access_log(&credential.id).await;
    }
    Ok(Json(ApiResponse::list("Credentials retrieved", credentials)))
}

/// GET /v1/credentials/accountant/:accountant_id: Active credentials assigned to an accountant.
#[utoipa::path(
    get,
    path = "/v1/credentials/accountant/{accountant_id}",
    params(("accountant_id" = Uuid, Path, description = "Accountant user ID")),
    responses(
        (status = 200, description = "Assigned credentials"),
        (status = 403, description = "Caller may not list this accountant", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn credentials_by_accountant(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(accountant_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<SafeCredential>>>, AppError> {
    let credentials = state
        .registry
        .list_by_accountant(&caller.context(), UserId::from_uuid(accountant_id))?;
    Ok(Json(ApiResponse::list("Credentials retrieved", credentials)))
}

/// GET /v1/credentials/:id/logs: Last 50 access log entries, newest first.
#[utoipa::path(
    get,
    path = "/v1/credentials/{id}/logs",
    params(("id" = Uuid, Path, description = "Credential ID")),
    responses(
        (status = 200, description = "Access log page"),
        (status = 403, description = "Caller may not read the log", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "credentials"
)]
async fn access_logs(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<AccessLogPage>>, AppError> {
    let page = state
        .registry
        .access_logs(&caller.context(), &CredentialId::from_uuid(id))?;
    Ok(Json(ApiResponse::ok("Access log retrieved", page)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_create() -> CreateCredentialRequest {
        CreateCredentialRequest {
            customer_number: "TB-000042".into(),
            sri_username: "1790012345001".into(),
            sri_password: "pw".into(),
            tax_id: "1790012345001".into(),
            taxpayer_type: "sociedad".into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_request_requires_fields() {
        assert!(valid_create().validate().is_ok());
        let missing = CreateCredentialRequest {
            sri_password: String::new(),
            ..valid_create()
        };
        assert_eq!(missing.validate().unwrap_err(), "sri_password is required");
    }

    #[test]
    fn create_request_converts_legacy_labels() {
        let input = valid_create().into_new_credential().unwrap();
        assert_eq!(input.taxpayer_type, TaxpayerType::Corporate);
        assert_eq!(input.tax_id.as_str(), "1790012345001");
    }

    #[test]
    fn create_request_rejects_bad_ruc() {
        let bad = CreateCredentialRequest {
            tax_id: "17900".into(),
            ..valid_create()
        };
        assert!(matches!(
            bad.into_new_credential(),
            Err(ValidationError::InvalidRuc(_))
        ));
    }

    #[test]
    fn update_request_parses_status() {
        let patch = UpdateCredentialRequest {
            status: Some("inactive".into()),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.status, Some(CredentialStatus::Inactive));

        let bad = UpdateCredentialRequest {
            status: Some("paused".into()),
            ..Default::default()
        };
        assert!(bad.into_patch().is_err());
    }

    #[test]
    fn update_request_rejects_blank_password() {
        let req = UpdateCredentialRequest {
            sri_password: Some("  ".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}

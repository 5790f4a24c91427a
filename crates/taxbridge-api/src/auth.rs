//! # Authentication Middleware
//!
//! Bearer token middleware producing the caller [`Identity`] the registry
//! authorizes against.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{user_id}:{customer_number}:{secret}   customer tokens
//! Bearer {role}:{user_id}:{secret}                     admin / accountant tokens
//! Bearer {secret}                                      shared secret, acts as admin
//! ```
//!
//! The shared secret stands in for signature verification of an issued
//! token. Handlers receive the parsed identity through [`CallerIdentity`].

use std::str::FromStr;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use taxbridge_core::{CustomerNumber, Role, UserId};
use taxbridge_vault::{Identity, RequestContext, UserDirectory};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Identity used for the bare shared secret and when auth is disabled.
pub fn service_admin() -> Identity {
    Identity::admin(UserId::from_uuid(Uuid::nil()), "Administration")
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated caller plus the client metadata recorded in access logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub identity: Identity,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CallerIdentity {
    /// The registry request context for this caller.
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.identity.clone())
            .with_client(self.ip_address.clone(), self.user_agent.clone())
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Reads the identity the auth middleware injected and replaces the token's
/// placeholder name with the directory display name.
///
/// Accountant and customer tokens must name an active directory user with the
/// same role, otherwise the request is rejected with 401. Admin tokens outside
/// the directory keep the placeholder name.
#[axum::async_trait]
impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))?;

        match state.directory.find_user_by_id(identity.id) {
            Some(user) if user.active && user.role == identity.role => {
                identity.display_name = user.display_name;
            }
            _ if identity.role != Role::Admin => {
                tracing::warn!(user_id = %identity.id, role = %identity.role, "token names no active directory user with that role");
                return Err(AppError::Unauthorized("unknown or inactive user".into()));
            }
            _ => {
                if identity.id.as_uuid() != &Uuid::nil() {
                    tracing::warn!(user_id = %identity.id, "admin token for a user outside the directory, keeping placeholder name");
                }
            }
        }

        Ok(Self {
            identity,
            ip_address: client_ip(&parts.headers),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token into an [`Identity`].
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<Identity, String> {
    let parts: Vec<&str> = provided.split(':').collect();

    let (role_str, user_str, customer_str, secret) = match parts.as_slice() {
        [secret] => {
            return if constant_time_token_eq(secret, expected_secret) {
                Ok(service_admin())
            } else {
                Err("invalid bearer token".into())
            };
        }
        [role, user, secret] => (*role, *user, None, *secret),
        [role, user, customer, secret] => (*role, *user, Some(*customer), *secret),
        _ => {
            return Err(
                "invalid token format, expected {role}:{user_id}[:{customer_number}]:{secret} or {secret}"
                    .into(),
            )
        }
    };

    if !constant_time_token_eq(secret, expected_secret) {
        return Err("invalid bearer token".into());
    }

    let role = Role::from_str(role_str).map_err(|_| format!("unknown role: {role_str}"))?;
    let user_id = user_str
        .parse::<Uuid>()
        .map(UserId::from_uuid)
        .map_err(|e| format!("invalid user_id: {e}"))?;
    let placeholder = format!("{role}:{user_id}");

    match (role, customer_str) {
        (Role::Admin, _) => Ok(Identity::admin(user_id, placeholder)),
        (Role::Accountant, _) => Ok(Identity::accountant(user_id, placeholder)),
        (Role::Customer, Some(number)) => {
            let number =
                CustomerNumber::new(number).map_err(|e| format!("invalid customer_number: {e}"))?;
            Ok(Identity::customer(user_id, placeholder, number))
        }
        (Role::Customer, None) => Err("customer tokens must carry a customer_number".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the caller [`Identity`].
///
/// When `AuthConfig.token` is `None`, every request acts as the service
/// administrator (development mode).
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                Some(provided) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                None if auth_header.is_some() => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(service_admin());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("UNAUTHORIZED", message)),
    )
        .into_response()
}

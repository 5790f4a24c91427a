//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! The credential registry is the source of truth for reads. When a
//! database pool is configured, every mutation is written through to
//! Postgres after the registry accepts it, and the store is hydrated from
//! Postgres on startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use sqlx::PgPool;
use taxbridge_core::CredentialId;
use taxbridge_crypto::{FieldCipher, FieldKey};
use taxbridge_vault::{
    CredentialDocument, CredentialRegistry, CredentialStore, Customer, InMemoryDirectory, User,
};
use zeroize::Zeroizing;

use crate::error::AppError;

// -- Configuration ------------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts secrets.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
    /// Field encryption secret: 64 hex chars or a passphrase. If `None`, an
    /// ephemeral key is generated.
    pub encryption_key: Option<Zeroizing<String>>,
    /// JSON file seeding the customer and user directory.
    pub directory_file: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("directory_file", &self.directory_file)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            encryption_key: None,
            directory_file: None,
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `SRI_ENCRYPTION_KEY` and `DIRECTORY_FILE`.
    /// Empty values count as unset.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(8080),
            auth_token: var("AUTH_TOKEN"),
            encryption_key: var("SRI_ENCRYPTION_KEY").map(Zeroizing::new),
            directory_file: var("DIRECTORY_FILE").map(PathBuf::from),
        }
    }
}

// -- Directory seed -----------------------------------------------------------

/// Contents of the `DIRECTORY_FILE` seed.
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub users: Vec<User>,
}

/// Error loading the directory seed.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read directory file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse directory file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl DirectorySeed {
    /// Read a seed file.
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Register every entry in `directory`.
    pub fn apply(self, directory: &InMemoryDirectory) -> (usize, usize) {
        let counts = (self.customers.len(), self.users.len());
        for customer in self.customers {
            directory.add_customer(customer);
        }
        for user in self.users {
            directory.add_user(user);
        }
        counts
    }
}

// -- State ----------------------------------------------------------------------

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Credential operations.
    pub registry: CredentialRegistry,
    /// Customer and user lookups backing the registry.
    pub directory: InMemoryDirectory,
    /// PostgreSQL pool. `None` means in-memory only.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl AppState {
    /// State with default configuration, an ephemeral key and no database.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State from configuration and an optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let key = match config.encryption_key.as_deref() {
            Some(secret) => FieldKey::from_secret(secret),
            None => {
                tracing::warn!(
                    "SRI_ENCRYPTION_KEY not set, using an ephemeral field key. \
                     Sealed credentials will be unreadable after restart."
                );
                FieldKey::generate()
            }
        };
        let directory = InMemoryDirectory::new();
        let registry = CredentialRegistry::new(
            CredentialStore::new(FieldCipher::new(key)),
            Arc::new(directory.clone()),
            Arc::new(directory.clone()),
        );
        Self {
            registry,
            directory,
            db_pool,
            config,
        }
    }

    /// Load persisted credentials into the store.
    pub async fn hydrate_from_db(&self) -> Result<usize, sqlx::Error> {
        let Some(pool) = &self.db_pool else {
            return Ok(0);
        };
        let documents = crate::db::credentials::load_all(pool).await?;
        let loaded = self.registry.store().load(documents);
        tracing::info!(credentials = loaded, "hydrated credential store from database");
        Ok(loaded)
    }

    /// The stored document as it is now, taken before a mutation so a failed
    /// write-through can be undone.
    pub fn snapshot(&self, id: &CredentialId) -> Option<CredentialDocument> {
        self.registry.store().document(id)
    }

    /// Write a mutation through to the database. On failure the in-memory
    /// store is put back to `before` and the error is surfaced.
    pub async fn commit(
        &self,
        id: &CredentialId,
        before: Option<CredentialDocument>,
    ) -> Result<(), AppError> {
        let result = self.persist(id).await;
        if result.is_err() {
            self.registry.store().restore(id, before);
            tracing::warn!(credential_id = %id, "rolled back in-memory change after failed persist");
        }
        result
    }

    /// Write the current document through to the database.
    async fn persist(&self, id: &CredentialId) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        let Some(doc) = self.registry.store().document(id) else {
            return Ok(());
        };
        crate::db::credentials::upsert(pool, &doc).await.map_err(|e| {
            tracing::error!(credential_id = %id, error = %e, "failed to persist credential");
            AppError::Internal("database persist failed".into())
        })
    }

    /// Write through a document whose only change is an access log entry.
    /// Failures are logged and swallowed; the entry stays in memory.
    pub async fn persist_access_log(&self, id: &CredentialId) {
        if let Err(e) = self.persist(id).await {
            tracing::warn!(credential_id = %id, error = %e, "access log not persisted");
        }
    }

    /// Remove a deleted credential from the database. On failure the
    /// deleted document is put back in memory.
    pub async fn forget(
        &self,
        id: &CredentialId,
        deleted: Option<CredentialDocument>,
    ) -> Result<(), AppError> {
        let Some(pool) = &self.db_pool else {
            return Ok(());
        };
        if let Err(e) = crate::db::credentials::delete(pool, id).await {
            tracing::error!(credential_id = %id, error = %e, "failed to delete credential from database");
            self.registry.store().restore(id, deleted);
            return Err(AppError::Internal("database delete failed".into()));
        }
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_secrets() {
        let config = AppConfig {
            auth_token: Some("token-value".into()),
            encryption_key: Some(Zeroizing::new("key-value".into())),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("token-value"));
        assert!(!debug.contains("key-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn seed_parses_and_applies() {
        let seed: DirectorySeed = serde_json::from_value(serde_json::json!({
            "customers": [{
                "id": "8d3c6f0e-2a51-4c1f-9d8e-0b7a5e4c3d21",
                "customer_number": "TB-000042",
                "full_name": "María Pérez",
                "email": null,
                "active": true
            }],
            "users": [{
                "id": "2b1f4c7a-9e3d-4a8b-b6c5-1d0e9f8a7b6c",
                "display_name": "Ana Torres",
                "role": "contador",
                "active": true
            }]
        }))
        .unwrap();
        let directory = InMemoryDirectory::new();
        assert_eq!(seed.apply(&directory), (1, 1));
    }

    #[tokio::test]
    async fn persistence_is_noop_without_pool() {
        let state = AppState::new();
        let id = CredentialId::new();
        assert!(state.commit(&id, None).await.is_ok());
        assert!(state.forget(&id, None).await.is_ok());
        assert_eq!(state.hydrate_from_db().await.unwrap(), 0);
    }
}

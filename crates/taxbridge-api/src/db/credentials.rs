//! Credential document persistence.
//!
//! All functions take a `&PgPool` and operate on the `sri_credentials`
//! table. Uniqueness is checked by the in-memory store before anything
//! reaches SQL.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use taxbridge_core::CredentialId;
use taxbridge_vault::CredentialDocument;
use uuid::Uuid;

fn encode_document(doc: &CredentialDocument) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(doc).map_err(|e| {
        tracing::error!(credential_id = %doc.id, error = %e, "failed to serialize credential document");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Insert or replace a credential document.
pub async fn upsert(pool: &PgPool, doc: &CredentialDocument) -> Result<(), sqlx::Error> {
    let document = encode_document(doc)?;

    sqlx::query(
        "INSERT INTO sri_credentials
            (id, credential_number, tax_id, customer_number, assigned_accountant, status, document, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
            credential_number = EXCLUDED.credential_number,
            tax_id = EXCLUDED.tax_id,
            customer_number = EXCLUDED.customer_number,
            assigned_accountant = EXCLUDED.assigned_accountant,
            status = EXCLUDED.status,
            document = EXCLUDED.document,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(*doc.id.as_uuid())
    .bind(doc.credential_number.as_str())
    .bind(doc.tax_id.as_str())
    .bind(doc.customer_number.as_str())
    .bind(doc.assigned_accountant.map(|a| *a.as_uuid()))
    .bind(doc.status.as_str())
    .bind(&document)
    .bind(doc.created_at)
    .bind(doc.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a credential. Returns whether a row was removed.
pub async fn delete(pool: &PgPool, id: &CredentialId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sri_credentials WHERE id = $1")
        .bind(*id.as_uuid())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load every credential document on startup.
///
/// Rows whose document no longer deserializes are skipped with an error
/// log rather than aborting startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CredentialDocument>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, document, updated_at FROM sri_credentials ORDER BY credential_number",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(CredentialRow::into_document).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    document: serde_json::Value,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_document(self) -> Option<CredentialDocument> {
        match serde_json::from_value::<CredentialDocument>(self.document) {
            Ok(mut doc) => {
                doc.updated_at = self.updated_at;
                Some(doc)
            }
            Err(e) => {
                tracing::error!(credential_id = %self.id, error = %e, "skipping unreadable credential row");
                None
            }
        }
    }
}

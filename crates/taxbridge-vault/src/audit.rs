//! # Access Audit Log
//!
//! Append-only record of who touched a credential, embedded in the
//! credential document. Stored oldest first and capped at
//! [`ACCESS_LOG_CAPACITY`] entries; the oldest are evicted first.
//! Reads return at most [`ACCESS_LOG_PAGE_SIZE`] entries, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxbridge_core::{AccessType, CredentialNumber, UserId};

use crate::context::RequestContext;
use crate::model::CredentialDocument;

/// Maximum number of entries kept per credential.
pub const ACCESS_LOG_CAPACITY: usize = 100;

/// Maximum number of entries returned by a log read.
pub const ACCESS_LOG_PAGE_SIZE: usize = 50;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub accessed_by: UserId,
    pub accessed_by_name: String,
    pub access_type: AccessType,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

impl AccessLogEntry {
    /// Build an entry for the caller in `ctx`.
    pub fn from_context(ctx: &RequestContext, access_type: AccessType, at: DateTime<Utc>) -> Self {
        Self {
            accessed_by: ctx.identity.id,
            accessed_by_name: ctx.identity.display_name.clone(),
            access_type,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            accessed_at: at,
        }
    }
}

/// A page of recent log entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessLogPage {
    pub credential_number: CredentialNumber,
    /// Newest first.
    pub logs: Vec<AccessLogEntry>,
}

impl CredentialDocument {
    /// Append an entry, update the last-access fields, and evict the oldest
    /// entries beyond capacity.
    pub fn log_access(&mut self, entry: AccessLogEntry) {
        self.last_accessed_at = Some(entry.accessed_at);
        self.last_accessed_by = Some(entry.accessed_by);
        self.access_log.push(entry);
        if self.access_log.len() > ACCESS_LOG_CAPACITY {
            let excess = self.access_log.len() - ACCESS_LOG_CAPACITY;
            self.access_log.drain(..excess);
        }
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_access(&self, limit: usize) -> Vec<AccessLogEntry> {
        self.access_log.iter().rev().take(limit).cloned().collect()
    }

    /// The standard log page for this credential.
    pub fn access_log_page(&self) -> AccessLogPage {
        AccessLogPage {
            credential_number: self.credential_number.clone(),
            logs: self.recent_access(ACCESS_LOG_PAGE_SIZE),
        }
    }
}

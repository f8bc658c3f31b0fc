// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit ledger for secret mutations.
//!
//! Entries are append-only. Each one is stored in `audit_logs` and indexed
//! under `project_id|inverted_sequence` so a forward prefix scan returns
//! the newest entry first. Metadata can carry old and new secret values, so
//! it is sealed like the values themselves.
//!
//! Recording never fails the calling operation: [`AuditLedger::record`]
//! logs the error and returns `None`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::cipher::{SealedValue, Sealer};
use super::database::{
    index_key, index_prefix, Reader, StoreError, StoreResult, Writer, AUDIT_LOGS, PROJECT_AUDIT,
};

/// Types of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Secret events
    SecretCreated,
    SecretUpdated,
    SecretDeleted,
    SecretBulkImport,
    SecretBulkClear,

    // Config events
    ConfigCreated,
    ConfigDeleted,
    ConfigForked,

    // Environment events
    EnvironmentCreated,
    EnvironmentDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SecretCreated => "secret_created",
            AuditAction::SecretUpdated => "secret_updated",
            AuditAction::SecretDeleted => "secret_deleted",
            AuditAction::SecretBulkImport => "secret_bulk_import",
            AuditAction::SecretBulkClear => "secret_bulk_clear",
            AuditAction::ConfigCreated => "config_created",
            AuditAction::ConfigDeleted => "config_deleted",
            AuditAction::ConfigForked => "config_forked",
            AuditAction::EnvironmentCreated => "environment_created",
            AuditAction::EnvironmentDeleted => "environment_deleted",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to an entry.
///
/// The named fields are the ones other components read back (rollback,
/// history). Anything else goes into `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_config_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_audit_log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_count: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AuditMetadata {
    /// Add an arbitrary field.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// An entry to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub details: String,
    pub metadata: AuditMetadata,
}

impl AuditEntry {
    pub fn new(action: AuditAction, details: impl Into<String>) -> Self {
        Self {
            action,
            details: details.into(),
            metadata: AuditMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: AuditMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Entry as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAuditLog {
    id: String,
    project_id: String,
    user_id: String,
    action: AuditAction,
    details: String,
    metadata: SealedValue,
    timestamp: DateTime<Utc>,
    sequence: u64,
}

/// A ledger entry with its metadata opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub action: AuditAction,
    pub details: String,
    #[schema(value_type = Object)]
    pub metadata: AuditMetadata,
    pub timestamp: DateTime<Utc>,
}

const AUDIT_SEQUENCE: &str = "audit";

fn sequence_key(project_id: &str, sequence: u64) -> String {
    index_key(project_id, &format!("{:016x}", u64::MAX - sequence))
}

/// Ledger access inside one transaction.
pub struct AuditLedger<'a, T> {
    txn: &'a T,
    sealer: &'a Sealer,
}

impl<'a, T: Reader> AuditLedger<'a, T> {
    pub fn new(txn: &'a T, sealer: &'a Sealer) -> Self {
        Self { txn, sealer }
    }

    fn open(&self, stored: StoredAuditLog) -> StoreResult<AuditLog> {
        let metadata = serde_json::from_str(&self.sealer.open(&stored.metadata)?)?;
        Ok(AuditLog {
            id: stored.id,
            project_id: stored.project_id,
            user_id: stored.user_id,
            action: stored.action,
            details: stored.details,
            metadata,
            timestamp: stored.timestamp,
        })
    }

    /// Get an entry, scoped to its project. Entries of other projects are
    /// reported as missing.
    pub fn get(&self, project_id: &str, log_id: &str) -> StoreResult<AuditLog> {
        match self.txn.record::<StoredAuditLog>(AUDIT_LOGS, log_id)? {
            Some(stored) if stored.project_id == project_id => self.open(stored),
            _ => Err(StoreError::NotFound("Audit log not found".to_string())),
        }
    }

    /// Up to `limit` entries of a project, newest first.
    pub fn list_by_project(&self, project_id: &str, limit: usize) -> StoreResult<Vec<AuditLog>> {
        let mut entries = Vec::new();
        for log_id in self.txn.children(PROJECT_AUDIT, project_id)? {
            if entries.len() >= limit {
                break;
            }
            if let Some(stored) = self.txn.record::<StoredAuditLog>(AUDIT_LOGS, &log_id)? {
                entries.push(self.open(stored)?);
            }
        }
        Ok(entries)
    }

    /// Every entry of a project whose metadata names `secret_key`, newest
    /// first. Scans the whole project ledger.
    pub fn history(&self, project_id: &str, secret_key: &str) -> StoreResult<Vec<AuditLog>> {
        Ok(self
            .list_by_project(project_id, usize::MAX)?
            .into_iter()
            .filter(|entry| entry.metadata.secret_key.as_deref() == Some(secret_key))
            .collect())
    }
}

impl<'a, T: Writer> AuditLedger<'a, T> {
    /// Append an entry, propagating failures.
    pub fn try_record(
        &self,
        project_id: &str,
        user_id: &str,
        entry: AuditEntry,
    ) -> StoreResult<String> {
        let metadata_json = serde_json::to_string(&entry.metadata)?;
        let sequence = self.txn.next_sequence(AUDIT_SEQUENCE)?;
        let stored = StoredAuditLog {
            id: uuid::Uuid::now_v7().to_string(),
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            action: entry.action,
            details: entry.details,
            metadata: self.sealer.seal(&metadata_json)?,
            timestamp: Utc::now(),
            sequence,
        };

        // Index first: a record without its index entry is unreachable.
        let key = sequence_key(project_id, sequence);
        self.txn.put_index(PROJECT_AUDIT, &key, &stored.id)?;
        if let Err(e) = self.txn.put_record(AUDIT_LOGS, &stored.id, &stored) {
            if let Err(cleanup) = self.txn.remove_index(PROJECT_AUDIT, &key) {
                tracing::warn!(error = %cleanup, "Failed to remove dangling audit index entry");
            }
            return Err(e);
        }
        Ok(stored.id)
    }

    /// Append an entry. Failures are logged and swallowed.
    pub fn record(&self, project_id: &str, user_id: &str, entry: AuditEntry) -> Option<String> {
        let action = entry.action;
        match self.try_record(project_id, user_id, entry) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(
                    project_id = %project_id,
                    action = %action,
                    error = %e,
                    "Failed to write audit log entry"
                );
                None
            }
        }
    }

    /// Remove every entry of a project (project deletion only).
    pub fn purge_project(&self, project_id: &str) -> StoreResult<usize> {
        let entries = self.txn.scan(PROJECT_AUDIT, &index_prefix(project_id))?;
        for (key, log_id) in &entries {
            self.txn.remove_index(PROJECT_AUDIT, key)?;
            self.txn.remove_record(AUDIT_LOGS, log_id)?;
        }
        Ok(entries.len())
    }
}

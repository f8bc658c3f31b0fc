// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Import/merge engine.
//!
//! Reconciles parsed entries against one config inside the caller's write
//! transaction. With `overwrite` every existing secret is removed first;
//! otherwise keys present before the import are skipped. Entries are
//! inserted in input order with `order` set to their input index.

use std::collections::HashSet;

use crate::storage::repository::{NewSecret, SecretRepository, StoredConfig, StoredProject};
use crate::storage::{
    AuditAction, AuditEntry, AuditLedger, AuditMetadata, Sealer, StoreError, StoreResult, Writer,
};

use super::formats::ParsedEntry;

/// Counts reported by an import.
///
/// `total` is the number of parsed entries and always equals
/// `imported + skipped + failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

pub fn import_into<T: Writer>(
    txn: &T,
    sealer: &Sealer,
    project: &StoredProject,
    user_id: &str,
    config: &StoredConfig,
    entries: &[ParsedEntry],
    overwrite: bool,
) -> StoreResult<ImportOutcome> {
    let secrets = SecretRepository::new(txn, sealer);
    let mut outcome = ImportOutcome {
        total: entries.len(),
        ..Default::default()
    };

    let cleared = if overwrite { secrets.clear(&config.id)? } else { 0 };

    // Snapshot taken once: duplicates inside the batch hit the key index
    // and are counted as failed.
    let existing: HashSet<String> = secrets
        .list_by_config(&config.id)?
        .into_iter()
        .map(|secret| secret.key)
        .collect();

    for (index, entry) in entries.iter().enumerate() {
        if entry.key.is_empty() {
            tracing::warn!(config_id = %config.id, index, "Import entry has an empty key");
            outcome.failed += 1;
            continue;
        }
        if !overwrite && existing.contains(&entry.key) {
            outcome.skipped += 1;
            continue;
        }

        let inserted = secrets.insert(NewSecret {
            secret_config_id: &config.id,
            key: &entry.key,
            value: &entry.value,
            secret_type: entry.secret_type,
            order: index as i64,
        });
        match inserted {
            Ok(_) => outcome.imported += 1,
            Err(StoreError::Conflict(reason)) => {
                tracing::warn!(
                    config_id = %config.id,
                    key = %entry.key,
                    reason = %reason,
                    "Import entry rejected"
                );
                outcome.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    AuditLedger::new(txn, sealer).record(
        &project.id,
        user_id,
        AuditEntry::new(
            AuditAction::SecretBulkImport,
            format!(
                "Imported {} secrets into {}",
                outcome.imported, config.name
            ),
        )
        .with_metadata(
            AuditMetadata {
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                secrets_count: Some(outcome.imported),
                ..Default::default()
            }
            .with("overwrite", overwrite)
            .with("replacedSecrets", cleared)
            .with("skipped", outcome.skipped)
            .with("failed", outcome.failed)
            .with("total", outcome.total),
        ),
    );

    tracing::info!(
        project_id = %project.id,
        config_id = %config.id,
        imported = outcome.imported,
        skipped = outcome.skipped,
        failed = outcome.failed,
        "Secrets imported"
    );

    Ok(outcome)
}

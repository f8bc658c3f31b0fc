// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rollback engine.
//!
//! Applies the inverse of a `secret_created`, `secret_updated` or
//! `secret_deleted` ledger entry and records the inverse as a new entry
//! that references the original through `originalAuditLogId`.
//!
//! Target resolution uses `metadata.secretConfigId` when the entry carries
//! it. Entries without it fall back to the first secret in the project
//! with the same key (environments by order, configs oldest first), which
//! is ambiguous when the key exists in several configs.

use crate::storage::repository::{
    ConfigRepository, EnvironmentRepository, NewSecret, Secret, SecretRepository, SecretType,
    StoredConfig, StoredProject,
};
use crate::storage::{
    AuditAction, AuditEntry, AuditLedger, AuditLog, AuditMetadata, OwnershipChain, Reader, Sealer,
    StoreError, StoreResult, Writer,
};

const NOT_ROLLBACKABLE: &str = "Cannot rollback this type of action";
const INSUFFICIENT_METADATA: &str = "Insufficient metadata for rollback";
const TARGET_MISSING: &str = "Rollback failed - could not find target secret or config";

/// What a rollback did.
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    /// Action of the inverse entry.
    pub action: AuditAction,
    pub details: String,
    /// Id of the inverse ledger entry, if it could be written.
    pub audit_log_id: Option<String>,
}

fn rollback_error(message: &str) -> StoreError {
    StoreError::Rollback(message.to_string())
}

pub fn rollback<T: Writer>(
    txn: &T,
    sealer: &Sealer,
    project: &StoredProject,
    user_id: &str,
    audit_log_id: &str,
) -> StoreResult<RollbackOutcome> {
    let ledger = AuditLedger::new(txn, sealer);
    let log = ledger.get(&project.id, audit_log_id)?;

    if !matches!(
        log.action,
        AuditAction::SecretCreated | AuditAction::SecretUpdated | AuditAction::SecretDeleted
    ) {
        return Err(rollback_error(NOT_ROLLBACKABLE));
    }
    let Some(key) = log.metadata.secret_key.clone() else {
        return Err(rollback_error(INSUFFICIENT_METADATA));
    };

    let secrets = SecretRepository::new(txn, sealer);
    let entry = match log.action {
        AuditAction::SecretCreated => {
            let (config, secret) = locate_secret(txn, sealer, project, &log, &key)?
                .ok_or_else(|| rollback_error(TARGET_MISSING))?;
            secrets.delete(&secret.id)?;

            AuditEntry::new(
                AuditAction::SecretDeleted,
                format!("Rolled back creation of secret \"{key}\""),
            )
            .with_metadata(AuditMetadata {
                old_value: Some(secret.value),
                secret_type: Some(secret.secret_type.to_string()),
                ..inverse_metadata(&log, &key, &config)
            })
        }
        AuditAction::SecretUpdated => {
            let Some(old_value) = log.metadata.old_value.clone() else {
                return Err(rollback_error(INSUFFICIENT_METADATA));
            };
            let (config, secret) = locate_secret(txn, sealer, project, &log, &key)?
                .ok_or_else(|| rollback_error(TARGET_MISSING))?;
            let restored = secrets.update_value(&secret.id, &old_value, None)?;

            AuditEntry::new(
                AuditAction::SecretUpdated,
                format!("Rolled back update of secret \"{key}\" to previous value"),
            )
            .with_metadata(AuditMetadata {
                old_value: Some(secret.value),
                new_value: Some(restored.value),
                secret_type: Some(restored.secret_type.to_string()),
                ..inverse_metadata(&log, &key, &config)
            })
        }
        _ => {
            let (Some(old_value), Some(config_name)) =
                (log.metadata.old_value.clone(), log.metadata.config_name.clone())
            else {
                return Err(rollback_error(INSUFFICIENT_METADATA));
            };
            let config = locate_config(txn, project, &log, &config_name)?
                .ok_or_else(|| rollback_error(TARGET_MISSING))?;
            let secret_type = match log.metadata.secret_type.as_deref() {
                Some(name) => name.parse::<SecretType>()?,
                None => SecretType::default(),
            };
            let recreated = secrets.insert(NewSecret {
                secret_config_id: &config.id,
                key: &key,
                value: &old_value,
                secret_type,
                order: secrets.next_order(&config.id)?,
            })?;

            AuditEntry::new(
                AuditAction::SecretCreated,
                format!("Rolled back deletion of secret \"{key}\""),
            )
            .with_metadata(AuditMetadata {
                new_value: Some(recreated.value),
                secret_type: Some(recreated.secret_type.to_string()),
                ..inverse_metadata(&log, &key, &config)
            })
        }
    };

    let action = entry.action;
    let details = entry.details.clone();
    let inverse_id = ledger.record(&project.id, user_id, entry);

    tracing::info!(
        project_id = %project.id,
        original_audit_log_id = %log.id,
        action = %action,
        "Rollback applied"
    );

    Ok(RollbackOutcome {
        action,
        details,
        audit_log_id: inverse_id,
    })
}

/// Metadata shared by every inverse entry.
fn inverse_metadata(log: &AuditLog, key: &str, config: &StoredConfig) -> AuditMetadata {
    AuditMetadata {
        secret_key: Some(key.to_string()),
        config_name: Some(config.name.clone()),
        secret_config_id: Some(config.id.clone()),
        original_audit_log_id: Some(log.id.clone()),
        ..Default::default()
    }
}

/// The config recorded on the entry, if it still exists in the project.
fn recorded_config<T: Reader>(
    txn: &T,
    project: &StoredProject,
    log: &AuditLog,
) -> StoreResult<Option<StoredConfig>> {
    let Some(config_id) = log.metadata.secret_config_id.as_deref() else {
        return Ok(None);
    };
    match OwnershipChain::new(txn).config(project, config_id) {
        Ok((_, config)) => Ok(Some(config)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Every config of the project: environments by order, configs oldest
/// first.
fn project_configs<T: Reader>(txn: &T, project: &StoredProject) -> StoreResult<Vec<StoredConfig>> {
    let configs = ConfigRepository::new(txn);
    let mut all = Vec::new();
    for environment in EnvironmentRepository::new(txn).list_by_project(&project.id)? {
        all.extend(configs.list_by_environment(&environment.id)?);
    }
    Ok(all)
}

fn locate_secret<T: Reader>(
    txn: &T,
    sealer: &Sealer,
    project: &StoredProject,
    log: &AuditLog,
    key: &str,
) -> StoreResult<Option<(StoredConfig, Secret)>> {
    let secrets = SecretRepository::new(txn, sealer);

    if log.metadata.secret_config_id.is_some() {
        let Some(config) = recorded_config(txn, project, log)? else {
            return Ok(None);
        };
        return Ok(secrets.find_by_key(&config.id, key)?.map(|secret| (config, secret)));
    }

    for config in project_configs(txn, project)? {
        if let Some(secret) = secrets.find_by_key(&config.id, key)? {
            return Ok(Some((config, secret)));
        }
    }
    Ok(None)
}

fn locate_config<T: Reader>(
    txn: &T,
    project: &StoredProject,
    log: &AuditLog,
    config_name: &str,
) -> StoreResult<Option<StoredConfig>> {
    if let Some(config) = recorded_config(txn, project, log)? {
        return Ok(Some(config));
    }
    Ok(project_configs(txn, project)?
        .into_iter()
        .find(|config| config.name == config_name))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Config fork: deep copy of a config and its secrets into a new named
//! config, possibly in another environment of the same project.

use crate::storage::repository::{
    is_valid_config_name, ConfigRepository, EnvironmentRepository, NewSecret, SecretRepository,
    StoredConfig, StoredProject,
};
use crate::storage::{
    AuditAction, AuditEntry, AuditLedger, AuditMetadata, Sealer, StoreError, StoreResult, Writer,
};

/// Result of a fork.
#[derive(Debug, Clone)]
pub struct ForkOutcome {
    pub config: StoredConfig,
    pub copied: usize,
}

/// Fork `source_config_id` into `new_name` under `target_environment_id`.
///
/// Both the source config and the target environment must belong to
/// `project`. The source is never modified; on any failure the caller's
/// transaction is aborted and nothing is created.
pub fn fork_config<T: Writer>(
    txn: &T,
    sealer: &Sealer,
    project: &StoredProject,
    user_id: &str,
    source_config_id: &str,
    new_name: &str,
    target_environment_id: &str,
) -> StoreResult<ForkOutcome> {
    if !is_valid_config_name(new_name) {
        return Err(StoreError::Validation(
            "Config name must be a valid bash identifier (letters, numbers, underscores, cannot start with number)"
                .to_string(),
        ));
    }

    let configs = ConfigRepository::new(txn);
    let environments = EnvironmentRepository::new(txn);

    let source = configs.find(source_config_id)?;
    let source_environment = match &source {
        Some(config) => environments.find(&config.environment_id)?,
        None => None,
    };
    let source = match (source, source_environment) {
        (Some(config), Some(environment)) if environment.project_id == project.id => config,
        _ => return Err(StoreError::NotFound("Source config not found".to_string())),
    };

    let target = environments
        .find(target_environment_id)?
        .filter(|environment| environment.project_id == project.id)
        .ok_or_else(|| StoreError::NotFound("Target environment not found".to_string()))?;

    let config = StoredConfig::new(&target.id, new_name);
    configs.create(&config)?;

    let secrets = SecretRepository::new(txn, sealer);
    let originals = secrets.list_by_config(&source.id)?;
    for secret in &originals {
        secrets.insert(NewSecret {
            secret_config_id: &config.id,
            key: &secret.key,
            value: &secret.value,
            secret_type: secret.secret_type,
            order: secret.order,
        })?;
    }
    let copied = originals.len();

    AuditLedger::new(txn, sealer).record(
        &project.id,
        user_id,
        AuditEntry::new(
            AuditAction::ConfigForked,
            format!(
                "Forked config \"{}\" to \"{}\" with {} secrets",
                source.name, new_name, copied
            ),
        )
        .with_metadata(
            AuditMetadata {
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                environment_name: Some(target.display_name.clone()),
                ..Default::default()
            }
            .with("sourceConfigName", source.name.as_str())
            .with("newConfigName", new_name)
            .with("copiedSecrets", copied),
        ),
    );

    tracing::info!(
        project_id = %project.id,
        source_config_id = %source.id,
        config_id = %config.id,
        copied,
        "Config forked"
    );

    Ok(ForkOutcome { config, copied })
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret config repository.
//!
//! A config is a named variant of an environment's settings (`prd`,
//! `prd_local`). Names are unique per environment through the
//! `environment_configs` index (`environment_id|name` → config_id).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::secrets::purge_config_secrets;
use crate::storage::database::{
    index_key, Reader, StoreError, StoreResult, Writer, ENVIRONMENT_CONFIGS, SECRET_CONFIGS,
};

static CONFIG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid config name pattern"));

/// Whether `name` is a valid bash-style identifier.
pub fn is_valid_config_name(name: &str) -> bool {
    CONFIG_NAME.is_match(name)
}

/// Secret config as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredConfig {
    pub id: String,
    pub environment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredConfig {
    pub fn new(environment_id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            environment_id: environment_id.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct ConfigRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> ConfigRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn find(&self, config_id: &str) -> StoreResult<Option<StoredConfig>> {
        self.txn.record(SECRET_CONFIGS, config_id)
    }

    pub fn get(&self, config_id: &str) -> StoreResult<StoredConfig> {
        self.find(config_id)?
            .ok_or_else(|| StoreError::NotFound("Secret config not found".to_string()))
    }

    pub fn find_by_name(&self, environment_id: &str, name: &str) -> StoreResult<Option<StoredConfig>> {
        match self
            .txn
            .index(ENVIRONMENT_CONFIGS, &index_key(environment_id, name))?
        {
            Some(config_id) => self.find(&config_id),
            None => Ok(None),
        }
    }

    /// Configs of an environment, oldest first.
    pub fn list_by_environment(&self, environment_id: &str) -> StoreResult<Vec<StoredConfig>> {
        let mut configs = Vec::new();
        for config_id in self.txn.children(ENVIRONMENT_CONFIGS, environment_id)? {
            if let Some(config) = self.find(&config_id)? {
                configs.push(config);
            }
        }
        configs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(configs)
    }
}

impl<'a, T: Writer> ConfigRepository<'a, T> {
    /// Insert a config; the name must be a valid identifier and unused in
    /// its environment.
    pub fn create(&self, config: &StoredConfig) -> StoreResult<()> {
        if !is_valid_config_name(&config.name) {
            return Err(StoreError::Validation(
                "Config name must be a valid bash identifier (letters, numbers, underscores, cannot start with number)"
                    .to_string(),
            ));
        }
        self.txn.insert_unique(
            ENVIRONMENT_CONFIGS,
            &index_key(&config.environment_id, &config.name),
            &config.id,
            || "A config with this name already exists in the environment".to_string(),
        )?;
        self.txn.put_record(SECRET_CONFIGS, &config.id, config)
    }

    /// Delete a config together with all of its secrets. Returns the number
    /// of secrets removed.
    pub fn delete_cascade(&self, config: &StoredConfig) -> StoreResult<usize> {
        let removed = purge_config_secrets(self.txn, &config.id)?;
        self.txn
            .remove_index(ENVIRONMENT_CONFIGS, &index_key(&config.environment_id, &config.name))?;
        self.txn.remove_record(SECRET_CONFIGS, &config.id)?;
        Ok(removed)
    }
}

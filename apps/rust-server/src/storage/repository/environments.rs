// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Environment repository.
//!
//! Shortcuts are unique per project through the `project_shortcuts` index.
//! Deleting an environment removes its configs and their secrets in the
//! same transaction.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::configs::{ConfigRepository, StoredConfig};
use crate::storage::database::{
    index_key, Reader, StoreError, StoreResult, Writer, ENVIRONMENTS, PROJECT_ENVIRONMENTS,
    PROJECT_SHORTCUTS,
};

static SHORTCUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{1,3}$").expect("valid shortcut pattern"));

/// Whether `shortcut` is 1 to 3 lowercase ASCII letters.
pub fn is_valid_shortcut(shortcut: &str) -> bool {
    SHORTCUT.is_match(shortcut)
}

/// Environment as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredEnvironment {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub display_name: String,
    pub shortcut: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredEnvironment {
    pub fn new(project_id: &str, name: &str, display_name: &str, shortcut: &str, order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            display_name: display_name.to_string(),
            shortcut: shortcut.to_string(),
            order,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What an environment delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub configs: usize,
    pub secrets: usize,
}

pub struct EnvironmentRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> EnvironmentRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn find(&self, environment_id: &str) -> StoreResult<Option<StoredEnvironment>> {
        self.txn.record(ENVIRONMENTS, environment_id)
    }

    /// Environments of a project ordered by `order`.
    pub fn list_by_project(&self, project_id: &str) -> StoreResult<Vec<StoredEnvironment>> {
        let mut environments = Vec::new();
        for environment_id in self.txn.child_keys(PROJECT_ENVIRONMENTS, project_id)? {
            if let Some(environment) = self.find(&environment_id)? {
                environments.push(environment);
            }
        }
        environments.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(environments)
    }

    /// First environment (by order) of a project with the given name.
    pub fn find_by_name(&self, project_id: &str, name: &str) -> StoreResult<Option<StoredEnvironment>> {
        Ok(self
            .list_by_project(project_id)?
            .into_iter()
            .find(|environment| environment.name == name))
    }

    /// Order for a new environment: one past the current maximum.
    pub fn next_order(&self, project_id: &str) -> StoreResult<i64> {
        Ok(self
            .list_by_project(project_id)?
            .iter()
            .map(|environment| environment.order + 1)
            .max()
            .unwrap_or(0))
    }
}

impl<'a, T: Writer> EnvironmentRepository<'a, T> {
    /// Insert an environment together with its default config (named after
    /// the shortcut). Returns the default config.
    pub fn create(&self, environment: &StoredEnvironment) -> StoreResult<StoredConfig> {
        if !is_valid_shortcut(&environment.shortcut) {
            return Err(StoreError::Validation(
                "Shortcut must be 1-3 lowercase letters".to_string(),
            ));
        }
        self.txn.insert_unique(
            PROJECT_SHORTCUTS,
            &index_key(&environment.project_id, &environment.shortcut),
            &environment.id,
            || {
                format!(
                    "Shortcut \"{}\" is already used in this project",
                    environment.shortcut
                )
            },
        )?;
        self.txn.put_record(ENVIRONMENTS, &environment.id, environment)?;
        self.txn.put_index(
            PROJECT_ENVIRONMENTS,
            &index_key(&environment.project_id, &environment.id),
            "",
        )?;

        let config = StoredConfig::new(&environment.id, &environment.shortcut);
        ConfigRepository::new(self.txn).create(&config)?;
        Ok(config)
    }

    /// Delete an environment, its configs and all of their secrets.
    pub fn delete_cascade(&self, environment: &StoredEnvironment) -> StoreResult<CascadeCounts> {
        let configs = ConfigRepository::new(self.txn);
        let mut counts = CascadeCounts::default();
        for config in configs.list_by_environment(&environment.id)? {
            counts.secrets += configs.delete_cascade(&config)?;
            counts.configs += 1;
        }

        self.txn.remove_index(
            PROJECT_SHORTCUTS,
            &index_key(&environment.project_id, &environment.shortcut),
        )?;
        self.txn.remove_index(
            PROJECT_ENVIRONMENTS,
            &index_key(&environment.project_id, &environment.id),
        )?;
        self.txn.remove_record(ENVIRONMENTS, &environment.id)?;
        Ok(counts)
    }
}

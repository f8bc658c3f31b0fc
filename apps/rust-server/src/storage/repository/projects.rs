// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project repository.
//!
//! A project is the tenant boundary: it is owned by exactly one user and
//! every environment, config, secret, audit entry and token beneath it is
//! removed with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::environments::{EnvironmentRepository, StoredEnvironment};
use super::tokens::TokenRepository;
use crate::storage::audit::AuditLedger;
use crate::storage::cipher::Sealer;
use crate::storage::database::{
    index_key, Reader, StoreError, StoreResult, Writer, OWNER_PROJECTS, PROJECTS,
};
use crate::storage::OwnedResource;

/// Environments every new project starts with: (name, display name, order).
/// The name doubles as shortcut and default config name.
pub const DEFAULT_ENVIRONMENTS: [(&str, &str, i64); 3] = [
    ("dev", "Development", 0),
    ("stg", "Staging", 1),
    ("prd", "Production", 2),
];

/// Project as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredProject {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    /// Owner user ID
    #[serde(rename = "userId")]
    pub owner_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnedResource for StoredProject {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

/// What a project delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectPurge {
    pub environments: usize,
    pub configs: usize,
    pub secrets: usize,
    pub audit_logs: usize,
    pub tokens: usize,
}

pub struct ProjectRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> ProjectRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn find(&self, project_id: &str) -> StoreResult<Option<StoredProject>> {
        self.txn.record(PROJECTS, project_id)
    }

    /// Projects owned by a user, newest first.
    pub fn list_by_owner(&self, owner_user_id: &str) -> StoreResult<Vec<StoredProject>> {
        let mut projects = Vec::new();
        for project_id in self.txn.child_keys(OWNER_PROJECTS, owner_user_id)? {
            if let Some(project) = self.find(&project_id)? {
                projects.push(project);
            }
        }
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }
}

impl<'a, T: Writer> ProjectRepository<'a, T> {
    /// Insert a project together with its default environments, each with
    /// its default config.
    pub fn create(&self, project: &StoredProject) -> StoreResult<Vec<StoredEnvironment>> {
        if project.name.trim().is_empty() {
            return Err(StoreError::Validation("Name is required".to_string()));
        }
        self.txn.put_record(PROJECTS, &project.id, project)?;
        self.txn.put_index(
            OWNER_PROJECTS,
            &index_key(&project.owner_user_id, &project.id),
            "",
        )?;

        let environments = EnvironmentRepository::new(self.txn);
        let mut created = Vec::with_capacity(DEFAULT_ENVIRONMENTS.len());
        for (name, display_name, order) in DEFAULT_ENVIRONMENTS {
            let environment = StoredEnvironment::new(&project.id, name, display_name, name, order);
            environments.create(&environment)?;
            created.push(environment);
        }
        Ok(created)
    }

    pub fn update(&self, project: &StoredProject) -> StoreResult<()> {
        if project.name.trim().is_empty() {
            return Err(StoreError::Validation("Name is required".to_string()));
        }
        self.txn.put_record(PROJECTS, &project.id, project)
    }

    /// Delete a project and everything rooted at it.
    pub fn delete_cascade(&self, project: &StoredProject, sealer: &Sealer) -> StoreResult<ProjectPurge> {
        let mut purge = ProjectPurge::default();

        let environments = EnvironmentRepository::new(self.txn);
        for environment in environments.list_by_project(&project.id)? {
            let counts = environments.delete_cascade(&environment)?;
            purge.environments += 1;
            purge.configs += counts.configs;
            purge.secrets += counts.secrets;
        }

        purge.audit_logs = AuditLedger::new(self.txn, sealer).purge_project(&project.id)?;
        purge.tokens = TokenRepository::new(self.txn).purge_project(&project.id)?;

        self.txn
            .remove_index(OWNER_PROJECTS, &index_key(&project.owner_user_id, &project.id))?;
        self.txn.remove_record(PROJECTS, &project.id)?;
        Ok(purge)
    }
}

impl StoredProject {
    pub fn new(owner_user_id: &str, name: &str, description: Option<String>, icon: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            description,
            icon,
            owner_user_id: owner_user_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

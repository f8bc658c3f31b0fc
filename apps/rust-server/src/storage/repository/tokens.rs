// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API token repository.
//!
//! Only the SHA-256 digest of a token is persisted. `token_hashes` maps the
//! digest to the token id and `project_tokens` lists the tokens of a
//! project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Permissions;
use crate::storage::database::{
    index_key, Reader, StoreError, StoreResult, Writer, API_TOKENS, PROJECT_TOKENS, TOKEN_HASHES,
};

/// Token as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub id: String,
    pub name: String,
    /// Hex SHA-256 of the plaintext token.
    pub token_hash: String,
    /// First characters of the plaintext, for display.
    pub token_prefix: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub permissions: Permissions,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredToken {
    /// Whether the token is usable at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

pub struct TokenRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> TokenRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn find(&self, token_id: &str) -> StoreResult<Option<StoredToken>> {
        self.txn.record(API_TOKENS, token_id)
    }

    /// Get a token that belongs to `project_id`.
    pub fn get_in_project(&self, project_id: &str, token_id: &str) -> StoreResult<StoredToken> {
        match self.find(token_id)? {
            Some(token) if token.project_id.as_deref() == Some(project_id) => Ok(token),
            _ => Err(StoreError::NotFound("Token not found".to_string())),
        }
    }

    pub fn find_by_hash(&self, token_hash: &str) -> StoreResult<Option<StoredToken>> {
        match self.txn.index(TOKEN_HASHES, token_hash)? {
            Some(token_id) => self.find(&token_id),
            None => Ok(None),
        }
    }

    /// Tokens of a project, newest first.
    pub fn list_by_project(&self, project_id: &str) -> StoreResult<Vec<StoredToken>> {
        let mut tokens = Vec::new();
        for token_id in self.txn.child_keys(PROJECT_TOKENS, project_id)? {
            if let Some(token) = self.find(&token_id)? {
                tokens.push(token);
            }
        }
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }
}

impl<'a, T: Writer> TokenRepository<'a, T> {
    pub fn create(&self, token: &StoredToken) -> StoreResult<()> {
        self.txn
            .insert_unique(TOKEN_HASHES, &token.token_hash, &token.id, || {
                "Token collision".to_string()
            })?;
        if let Some(project_id) = &token.project_id {
            self.txn
                .put_index(PROJECT_TOKENS, &index_key(project_id, &token.id), "")?;
        }
        self.txn.put_record(API_TOKENS, &token.id, token)
    }

    /// Persist changes to mutable fields (name, permissions, flags, times).
    pub fn update(&self, token: &StoredToken) -> StoreResult<()> {
        self.txn.put_record(API_TOKENS, &token.id, token)
    }

    pub fn delete(&self, token: &StoredToken) -> StoreResult<()> {
        self.txn.remove_index(TOKEN_HASHES, &token.token_hash)?;
        if let Some(project_id) = &token.project_id {
            self.txn
                .remove_index(PROJECT_TOKENS, &index_key(project_id, &token.id))?;
        }
        self.txn.remove_record(API_TOKENS, &token.id)?;
        Ok(())
    }

    /// Delete every token of a project.
    pub fn purge_project(&self, project_id: &str) -> StoreResult<usize> {
        let tokens = self.list_by_project(project_id)?;
        for token in &tokens {
            self.delete(token)?;
        }
        Ok(tokens.len())
    }
}

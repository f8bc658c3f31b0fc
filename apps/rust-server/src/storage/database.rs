// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded store of record backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! Primary tables map an id to a JSON-serialized record:
//!
//! - `projects`, `environments`, `secret_configs`, `secrets`,
//!   `audit_logs`, `api_tokens`, `users`
//!
//! Index tables map a composite `parent|child` string key to a value and are
//! scanned by prefix:
//!
//! - `owner_projects`: `user_id|project_id` → `""`
//! - `project_environments`: `project_id|environment_id` → `""`
//! - `project_shortcuts`: `project_id|shortcut` → environment_id
//! - `environment_configs`: `environment_id|config_name` → config_id
//! - `config_secrets`: `config_id|secret_key` → secret_id
//! - `project_audit`: `project_id|inverted_sequence` → audit_log_id
//! - `project_tokens`: `project_id|token_id` → `""`
//! - `token_hashes`: sha256 hex → token_id
//!
//! The unique indexes (`project_shortcuts`, `environment_configs`,
//! `config_secrets`, `token_hashes`) are the authority for the uniqueness
//! rules; callers go through [`Writer::insert_unique`].
//!
//! Every request runs inside exactly one redb transaction. redb admits a
//! single writer at a time, so a check-then-mutate sequence inside
//! [`SecretStore::write`] cannot interleave with another request.

use std::path::{Path, PathBuf};

use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition,
    WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

use super::cipher::Sealer;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: id → serialized record (JSON bytes).
pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Index table: composite key → value.
pub type IndexTable = TableDefinition<'static, &'static str, &'static str>;

pub const PROJECTS: RecordTable = TableDefinition::new("projects");
pub const ENVIRONMENTS: RecordTable = TableDefinition::new("environments");
pub const SECRET_CONFIGS: RecordTable = TableDefinition::new("secret_configs");
pub const SECRETS: RecordTable = TableDefinition::new("secrets");
pub const AUDIT_LOGS: RecordTable = TableDefinition::new("audit_logs");
pub const API_TOKENS: RecordTable = TableDefinition::new("api_tokens");
pub const USERS: RecordTable = TableDefinition::new("users");

pub const OWNER_PROJECTS: IndexTable = TableDefinition::new("owner_projects");
pub const PROJECT_ENVIRONMENTS: IndexTable = TableDefinition::new("project_environments");
pub const PROJECT_SHORTCUTS: IndexTable = TableDefinition::new("project_shortcuts");
pub const ENVIRONMENT_CONFIGS: IndexTable = TableDefinition::new("environment_configs");
pub const CONFIG_SECRETS: IndexTable = TableDefinition::new("config_secrets");
pub const PROJECT_AUDIT: IndexTable = TableDefinition::new("project_audit");
pub const PROJECT_TOKENS: IndexTable = TableDefinition::new("project_tokens");
pub const TOKEN_HASHES: IndexTable = TableDefinition::new("token_hashes");

/// Named counters: name → u64.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const RECORD_TABLES: [RecordTable; 7] = [
    PROJECTS,
    ENVIRONMENTS,
    SECRET_CONFIGS,
    SECRETS,
    AUDIT_LOGS,
    API_TOKENS,
    USERS,
];

const INDEX_TABLES: [IndexTable; 8] = [
    OWNER_PROJECTS,
    PROJECT_ENVIRONMENTS,
    PROJECT_SHORTCUTS,
    ENVIRONMENT_CONFIGS,
    CONFIG_SECRETS,
    PROJECT_AUDIT,
    PROJECT_TOKENS,
    TOKEN_HASHES,
];

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cannot create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cipher error: {0}")]
    Cipher(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Rollback(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Key Helpers
// =============================================================================

/// Build a composite index key `parent|child`.
pub fn index_key(parent: &str, child: &str) -> String {
    let mut key = String::with_capacity(parent.len() + 1 + child.len());
    key.push_str(parent);
    key.push('|');
    key.push_str(child);
    key
}

/// Build the prefix matching every index key under `parent`.
pub fn index_prefix(parent: &str) -> String {
    let mut prefix = String::with_capacity(parent.len() + 1);
    prefix.push_str(parent);
    prefix.push('|');
    prefix
}

// =============================================================================
// Transaction Access
// =============================================================================

fn read_record<T, Tbl>(table: &Tbl, id: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_index<Tbl>(table: &Tbl, key: &str) -> StoreResult<Option<String>>
where
    Tbl: ReadableTable<&'static str, &'static str>,
{
    Ok(table.get(key)?.map(|value| value.value().to_string()))
}

/// Forward scan of every `(key, value)` whose key starts with `prefix`.
fn read_prefix<Tbl>(table: &Tbl, prefix: &str) -> StoreResult<Vec<(String, String)>>
where
    Tbl: ReadableTable<&'static str, &'static str>,
{
    let mut entries = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        entries.push((key.to_string(), value.value().to_string()));
    }
    Ok(entries)
}

/// Read access shared by read and write transactions.
///
/// Each call opens the table, uses it and drops it again, so calls can be
/// freely interleaved with [`Writer`] calls on the same write transaction.
pub trait Reader {
    fn record<T: DeserializeOwned>(&self, table: RecordTable, id: &str) -> StoreResult<Option<T>>;

    fn index(&self, table: IndexTable, key: &str) -> StoreResult<Option<String>>;

    fn scan(&self, table: IndexTable, prefix: &str) -> StoreResult<Vec<(String, String)>>;

    /// Values of every index entry under `parent`, in key order.
    fn children(&self, table: IndexTable, parent: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .scan(table, &index_prefix(parent))?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Child ids of index entries shaped `parent|child_id → ""`.
    fn child_keys(&self, table: IndexTable, parent: &str) -> StoreResult<Vec<String>> {
        let prefix = index_prefix(parent);
        Ok(self
            .scan(table, &prefix)?
            .into_iter()
            .map(|(key, _)| key[prefix.len()..].to_string())
            .collect())
    }
}

impl Reader for ReadTransaction {
    fn record<T: DeserializeOwned>(&self, table: RecordTable, id: &str) -> StoreResult<Option<T>> {
        read_record(&self.open_table(table)?, id)
    }

    fn index(&self, table: IndexTable, key: &str) -> StoreResult<Option<String>> {
        read_index(&self.open_table(table)?, key)
    }

    fn scan(&self, table: IndexTable, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        read_prefix(&self.open_table(table)?, prefix)
    }
}

impl Reader for WriteTransaction {
    fn record<T: DeserializeOwned>(&self, table: RecordTable, id: &str) -> StoreResult<Option<T>> {
        read_record(&self.open_table(table)?, id)
    }

    fn index(&self, table: IndexTable, key: &str) -> StoreResult<Option<String>> {
        read_index(&self.open_table(table)?, key)
    }

    fn scan(&self, table: IndexTable, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        read_prefix(&self.open_table(table)?, prefix)
    }
}

/// Mutations, only available inside a write transaction.
pub trait Writer: Reader {
    fn put_record<T: Serialize>(&self, table: RecordTable, id: &str, record: &T) -> StoreResult<()>;

    /// Remove a record, returning whether it existed.
    fn remove_record(&self, table: RecordTable, id: &str) -> StoreResult<bool>;

    fn put_index(&self, table: IndexTable, key: &str, value: &str) -> StoreResult<()>;

    fn remove_index(&self, table: IndexTable, key: &str) -> StoreResult<()>;

    /// Insert into a unique index; fails with `Conflict(conflict)` when the
    /// key is already taken.
    fn insert_unique(
        &self,
        table: IndexTable,
        key: &str,
        value: &str,
        conflict: impl FnOnce() -> String,
    ) -> StoreResult<()>;

    /// Increment and return the named counter (first value is 1).
    fn next_sequence(&self, name: &str) -> StoreResult<u64>;
}

impl Writer for WriteTransaction {
    fn put_record<T: Serialize>(&self, table: RecordTable, id: &str, record: &T) -> StoreResult<()> {
        let json = serde_json::to_vec(record)?;
        let mut table = self.open_table(table)?;
        table.insert(id, json.as_slice())?;
        Ok(())
    }

    fn remove_record(&self, table: RecordTable, id: &str) -> StoreResult<bool> {
        let mut table = self.open_table(table)?;
        let removed = table.remove(id)?.is_some();
        Ok(removed)
    }

    fn put_index(&self, table: IndexTable, key: &str, value: &str) -> StoreResult<()> {
        let mut table = self.open_table(table)?;
        table.insert(key, value)?;
        Ok(())
    }

    fn remove_index(&self, table: IndexTable, key: &str) -> StoreResult<()> {
        let mut table = self.open_table(table)?;
        table.remove(key)?;
        Ok(())
    }

    fn insert_unique(
        &self,
        table: IndexTable,
        key: &str,
        value: &str,
        conflict: impl FnOnce() -> String,
    ) -> StoreResult<()> {
        let mut table = self.open_table(table)?;
        if table.get(key)?.is_some() {
            return Err(StoreError::Conflict(conflict()));
        }
        table.insert(key, value)?;
        Ok(())
    }

    fn next_sequence(&self, name: &str) -> StoreResult<u64> {
        let mut table = self.open_table(META)?;
        let current = table.get(name)?.map(|v| v.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(name, next)?;
        Ok(next)
    }
}

// =============================================================================
// SecretStore
// =============================================================================

/// Handle to the embedded database plus the value sealer.
pub struct SecretStore {
    db: Database,
    sealer: Sealer,
}

impl SecretStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path, sealer: Sealer) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            for table in RECORD_TABLES {
                let _ = write_txn.open_table(table)?;
            }
            for table in INDEX_TABLES {
                let _ = write_txn.open_table(table)?;
            }
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db, sealer })
    }

    pub fn sealer(&self) -> &Sealer {
        &self.sealer
    }

    /// Run `f` against a consistent read snapshot.
    pub fn read<T, E>(&self, f: impl FnOnce(&ReadTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let read_txn = self.db.begin_read().map_err(StoreError::from)?;
        f(&read_txn)
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error aborts
    /// it and none of its writes become visible.
    pub fn write<T, E>(&self, f: impl FnOnce(&WriteTransaction) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let write_txn = self.db.begin_write().map_err(StoreError::from)?;
        match f(&write_txn) {
            Ok(value) => {
                write_txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::warn!(error = %abort_err, "Failed to abort write transaction");
                }
                Err(e)
            }
        }
    }

    /// Verify the database answers a read transaction.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(PROJECTS)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

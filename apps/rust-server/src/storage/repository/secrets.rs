// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret repository.
//!
//! Secrets are keyed by id in `secrets` and indexed by `config_id|key` in
//! `config_secrets`, which is the uniqueness authority for keys within a
//! config. Values are sealed with the store's [`Sealer`] before they reach
//! disk.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::cipher::{SealedValue, Sealer};
use crate::storage::database::{
    index_key, index_prefix, Reader, StoreError, StoreResult, Writer, CONFIG_SECRETS, SECRETS,
};

/// Logical type of a secret value. The value itself is always stored as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SecretType {
    #[default]
    Text,
    Email,
    Password,
    Uuid,
    Date,
    Datetime,
    Integer,
    Decimal,
    Boolean,
    Url,
    Json,
    Xml,
    Yaml,
}

impl SecretType {
    pub const ALL: [SecretType; 13] = [
        SecretType::Text,
        SecretType::Email,
        SecretType::Password,
        SecretType::Uuid,
        SecretType::Date,
        SecretType::Datetime,
        SecretType::Integer,
        SecretType::Decimal,
        SecretType::Boolean,
        SecretType::Url,
        SecretType::Json,
        SecretType::Xml,
        SecretType::Yaml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Text => "text",
            SecretType::Email => "email",
            SecretType::Password => "password",
            SecretType::Uuid => "uuid",
            SecretType::Date => "date",
            SecretType::Datetime => "datetime",
            SecretType::Integer => "integer",
            SecretType::Decimal => "decimal",
            SecretType::Boolean => "boolean",
            SecretType::Url => "url",
            SecretType::Json => "json",
            SecretType::Xml => "xml",
            SecretType::Yaml => "yaml",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecretType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecretType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("Unknown secret type \"{s}\"")))
    }
}

/// Secret as persisted (value sealed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSecret {
    pub id: String,
    pub secret_config_id: String,
    pub key: String,
    pub value: SealedValue,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Secret with its value opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub id: String,
    pub secret_config_id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a secret.
#[derive(Debug, Clone)]
pub struct NewSecret<'s> {
    pub secret_config_id: &'s str,
    pub key: &'s str,
    pub value: &'s str,
    pub secret_type: SecretType,
    pub order: i64,
}

fn duplicate_key(key: &str) -> String {
    format!("Secret with key \"{key}\" already exists in this configuration")
}

/// Repository for secrets inside one transaction.
pub struct SecretRepository<'a, T> {
    txn: &'a T,
    sealer: &'a Sealer,
}

impl<'a, T: Reader> SecretRepository<'a, T> {
    pub fn new(txn: &'a T, sealer: &'a Sealer) -> Self {
        Self { txn, sealer }
    }

    fn open(&self, stored: StoredSecret) -> StoreResult<Secret> {
        Ok(Secret {
            value: self.sealer.open(&stored.value)?,
            id: stored.id,
            secret_config_id: stored.secret_config_id,
            key: stored.key,
            secret_type: stored.secret_type,
            order: stored.order,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    fn stored(&self, secret_id: &str) -> StoreResult<Option<StoredSecret>> {
        self.txn.record(SECRETS, secret_id)
    }

    /// Get a secret by id.
    pub fn get(&self, secret_id: &str) -> StoreResult<Secret> {
        match self.stored(secret_id)? {
            Some(stored) => self.open(stored),
            None => Err(StoreError::NotFound("Secret not found".to_string())),
        }
    }

    /// Find a secret by key within a config.
    pub fn find_by_key(&self, config_id: &str, key: &str) -> StoreResult<Option<Secret>> {
        let Some(secret_id) = self.txn.index(CONFIG_SECRETS, &index_key(config_id, key))? else {
            return Ok(None);
        };
        match self.stored(&secret_id)? {
            Some(stored) => self.open(stored).map(Some),
            None => Ok(None),
        }
    }

    /// All secrets of a config ordered by `order` (ties by key).
    pub fn list_by_config(&self, config_id: &str) -> StoreResult<Vec<Secret>> {
        let mut secrets = Vec::new();
        for secret_id in self.txn.children(CONFIG_SECRETS, config_id)? {
            if let Some(stored) = self.stored(&secret_id)? {
                secrets.push(self.open(stored)?);
            }
        }
        secrets.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.key.cmp(&b.key)));
        Ok(secrets)
    }

    /// Highest `order` in a config, 0 when the config is empty.
    pub fn max_order(&self, config_id: &str) -> StoreResult<i64> {
        let mut max = 0;
        for secret_id in self.txn.children(CONFIG_SECRETS, config_id)? {
            if let Some(stored) = self.stored(&secret_id)? {
                max = max.max(stored.order);
            }
        }
        Ok(max)
    }

    /// Order for the next single insert: max + 1.
    pub fn next_order(&self, config_id: &str) -> StoreResult<i64> {
        Ok(self.max_order(config_id)? + 1)
    }

    /// Ids of all secrets in a config.
    pub fn ids_in_config(&self, config_id: &str) -> StoreResult<Vec<String>> {
        self.txn.children(CONFIG_SECRETS, config_id)
    }
}

impl<'a, T: Writer> SecretRepository<'a, T> {
    /// Insert a new secret; fails with `Conflict` if the key already exists
    /// in the config.
    pub fn insert(&self, new: NewSecret<'_>) -> StoreResult<Secret> {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        self.txn.insert_unique(
            CONFIG_SECRETS,
            &index_key(new.secret_config_id, new.key),
            &id,
            || duplicate_key(new.key),
        )?;

        let stored = StoredSecret {
            id,
            secret_config_id: new.secret_config_id.to_string(),
            key: new.key.to_string(),
            value: self.sealer.seal(new.value)?,
            secret_type: new.secret_type,
            order: new.order,
            created_at: now,
            updated_at: now,
        };
        self.txn.put_record(SECRETS, &stored.id, &stored)?;
        self.open(stored)
    }

    /// Replace the value (and optionally the type) of an existing secret.
    pub fn update_value(
        &self,
        secret_id: &str,
        value: &str,
        secret_type: Option<SecretType>,
    ) -> StoreResult<Secret> {
        let Some(mut stored) = self.stored(secret_id)? else {
            return Err(StoreError::NotFound("Secret not found".to_string()));
        };
        stored.value = self.sealer.seal(value)?;
        if let Some(secret_type) = secret_type {
            stored.secret_type = secret_type;
        }
        stored.updated_at = Utc::now();
        self.txn.put_record(SECRETS, &stored.id, &stored)?;
        self.open(stored)
    }

    /// Delete a secret and its key index entry.
    pub fn delete(&self, secret_id: &str) -> StoreResult<()> {
        let Some(stored) = self.stored(secret_id)? else {
            return Err(StoreError::NotFound("Secret not found".to_string()));
        };
        self.txn
            .remove_index(CONFIG_SECRETS, &index_key(&stored.secret_config_id, &stored.key))?;
        self.txn.remove_record(SECRETS, secret_id)?;
        Ok(())
    }

    /// Delete every secret of a config, returning how many were removed.
    pub fn clear(&self, config_id: &str) -> StoreResult<usize> {
        purge_config_secrets(self.txn, config_id)
    }
}

/// Remove every secret under a config. Values are never opened, so this is
/// usable without the sealer during cascades.
pub(crate) fn purge_config_secrets<T: Writer>(txn: &T, config_id: &str) -> StoreResult<usize> {
    let entries = txn.scan(CONFIG_SECRETS, &index_prefix(config_id))?;
    for (key, secret_id) in &entries {
        txn.remove_index(CONFIG_SECRETS, key)?;
        txn.remove_record(SECRETS, secret_id)?;
    }
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    fn new_secret<'s>(config: &'s str, key: &'s str, value: &'s str, order: i64) -> NewSecret<'s> {
        NewSecret {
            secret_config_id: config,
            key,
            value,
            secret_type: SecretType::Text,
            order,
        }
    }

    #[test]
    fn insert_and_list_in_order() {
        let (store, _dir) = temp_store();
        store
            .write(|txn| {
                let repo = SecretRepository::new(txn, store.sealer());
                repo.insert(new_secret("cfg", "B", "2", 2))?;
                repo.insert(new_secret("cfg", "A", "1", 1))?;
                Ok::<_, StoreError>(())
            })
            .unwrap();

        let secrets = store
            .read(|txn| SecretRepository::new(txn, store.sealer()).list_by_config("cfg"))
            .unwrap();
        let keys: Vec<_> = secrets.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(secrets[0].value, "1");
    }

    #[test]
    fn duplicate_key_conflicts() {
        let (store, _dir) = temp_store();
        let err = store
            .write(|txn| {
                let repo = SecretRepository::new(txn, store.sealer());
                repo.insert(new_secret("cfg", "KEY", "a", 1))?;
                repo.insert(new_secret("cfg", "KEY", "b", 2))
            })
            .unwrap_err();
        assert!(
            matches!(err, StoreError::Conflict(ref msg) if msg == "Secret with key \"KEY\" already exists in this configuration")
        );
    }

    #[test]
    fn next_order_is_max_plus_one() {
        let (store, _dir) = temp_store();
        store
            .write(|txn| {
                let repo = SecretRepository::new(txn, store.sealer());
                assert_eq!(repo.next_order("cfg")?, 1);
                repo.insert(new_secret("cfg", "A", "1", 5))?;
                repo.insert(new_secret("cfg", "B", "1", 3))?;
                assert_eq!(repo.next_order("cfg")?, 6);
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn update_and_delete() {
        let (store, _dir) = temp_store();
        store
            .write(|txn| {
                let repo = SecretRepository::new(txn, store.sealer());
                let secret = repo.insert(new_secret("cfg", "PORT", "80", 1))?;
                let updated = repo.update_value(&secret.id, "8080", Some(SecretType::Integer))?;
                assert_eq!(updated.value, "8080");
                assert_eq!(updated.secret_type, SecretType::Integer);

                repo.delete(&secret.id)?;
                assert!(repo.find_by_key("cfg", "PORT")?.is_none());
                // key is free again
                repo.insert(new_secret("cfg", "PORT", "81", 1))?;
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn clear_only_touches_one_config() {
        let (store, _dir) = temp_store();
        let cleared = store
            .write(|txn| {
                let repo = SecretRepository::new(txn, store.sealer());
                repo.insert(new_secret("cfg", "A", "1", 1))?;
                repo.insert(new_secret("cfg", "B", "1", 2))?;
                repo.insert(new_secret("other", "A", "1", 1))?;
                repo.clear("cfg")
            })
            .unwrap();
        assert_eq!(cleared, 2);

        let other = store
            .read(|txn| SecretRepository::new(txn, store.sealer()).list_by_config("other"))
            .unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn secret_type_parses_all_names() {
        for t in SecretType::ALL {
            assert_eq!(t.as_str().parse::<SecretType>().unwrap(), t);
        }
        assert!("float".parse::<SecretType>().is_err());
    }
}

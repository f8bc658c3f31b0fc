// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profiles as last seen in a session, used to label audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::database::{Reader, StoreResult, Writer, USERS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

pub struct UserRepository<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> UserRepository<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn find(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        self.txn.record(USERS, user_id)
    }

    /// Whether the stored profile differs from the given email and name.
    pub fn needs_update(
        &self,
        user_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(match self.find(user_id)? {
            Some(profile) => profile.email.as_deref() != email || profile.name.as_deref() != name,
            None => true,
        })
    }
}

impl<'a, T: Writer> UserRepository<'a, T> {
    pub fn upsert(&self, user_id: &str, email: Option<&str>, name: Option<&str>) -> StoreResult<()> {
        let profile = UserProfile {
            id: user_id.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            updated_at: Utc::now(),
        };
        self.txn.put_record(USERS, user_id, &profile)
    }
}

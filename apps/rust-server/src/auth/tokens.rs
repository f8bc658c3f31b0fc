// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token authority for the programmatic API.
//!
//! Tokens are `crypt_` followed by 32 random bytes in unpadded base64url.
//! The plaintext leaves the server once, in the create response; only its
//! SHA-256 digest is stored and validation compares digests.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use super::permissions::{Permissions, TokenAction};
use super::AuthError;
use crate::storage::repository::{ProjectRepository, StoredProject, StoredToken, TokenRepository};
use crate::storage::{StoreError, StoreResult, Writer};

/// Distinguishing prefix of every API token.
pub const TOKEN_PREFIX: &str = "crypt_";

/// Random bytes per token.
const TOKEN_BYTES: usize = 32;

/// Characters of the plaintext kept for display.
const DISPLAY_PREFIX_LEN: usize = 12;

/// Generate a new plaintext token.
pub fn generate_token() -> StoreResult<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| StoreError::Cipher("random source unavailable".to_string()))?;
    Ok(format!("{TOKEN_PREFIX}{}", Base64UrlUnpadded::encode_string(&bytes)))
}

/// Hex SHA-256 of a plaintext token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Extract the token from an `Authorization` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// A token together with its one-time plaintext.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: StoredToken,
    pub plaintext: String,
}

/// What a valid token grants.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub token_id: String,
    pub user_id: String,
    pub project: StoredProject,
    pub permissions: Permissions,
}

impl TokenContext {
    /// Check the token may perform `action` on `environment`.
    pub fn authorize(&self, action: TokenAction, environment: &str) -> Result<(), AuthError> {
        if self.permissions.authorize(action, environment) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }
}

/// Issues and validates tokens inside one write transaction.
pub struct TokenAuthority<'a, T> {
    txn: &'a T,
}

impl<'a, T: Writer> TokenAuthority<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    pub fn issue(
        &self,
        user_id: &str,
        project_id: &str,
        name: &str,
        permissions: Permissions,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<IssuedToken> {
        let plaintext = generate_token()?;
        let now = Utc::now();
        let token = StoredToken {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            token_hash: hash_token(&plaintext),
            token_prefix: plaintext.chars().take(DISPLAY_PREFIX_LEN).collect(),
            user_id: user_id.to_string(),
            project_id: Some(project_id.to_string()),
            permissions,
            is_active: true,
            expires_at,
            last_used: None,
            created_at: now,
            updated_at: now,
        };
        TokenRepository::new(self.txn).create(&token)?;
        Ok(IssuedToken { token, plaintext })
    }

    /// Resolve a plaintext token. Returns `None` when the token is unknown,
    /// inactive, expired or not attached to an existing project. A valid
    /// token has its `last_used` set to now.
    pub fn validate(&self, plaintext: &str) -> StoreResult<Option<TokenContext>> {
        let tokens = TokenRepository::new(self.txn);
        let Some(mut token) = tokens.find_by_hash(&hash_token(plaintext))? else {
            return Ok(None);
        };

        let now = Utc::now();
        if !token.is_usable(now) {
            return Ok(None);
        }
        let Some(project_id) = token.project_id.clone() else {
            return Ok(None);
        };
        let Some(project) = ProjectRepository::new(self.txn).find(&project_id)? else {
            return Ok(None);
        };

        token.last_used = Some(now);
        tokens.update(&token)?;

        Ok(Some(TokenContext {
            token_id: token.id,
            user_id: token.user_id,
            project,
            permissions: token.permissions,
        }))
    }
}

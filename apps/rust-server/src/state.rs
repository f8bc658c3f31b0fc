// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::SecretStore;

/// Default page size of the audit listing.
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Session verification settings.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// HS256 key for session JWTs.
    pub session_secret: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SecretStore>,
    pub auth_config: Arc<AuthConfig>,
    pub audit_default_limit: usize,
    /// Directory holding the store, reported by the health check.
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(store: SecretStore) -> Self {
        Self {
            store: Arc::new(store),
            auth_config: Arc::new(AuthConfig::default()),
            audit_default_limit: DEFAULT_AUDIT_LIMIT,
            data_dir: None,
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = Arc::new(auth_config);
        self
    }

    pub fn with_audit_limit(mut self, limit: usize) -> Self {
        self.audit_default_limit = limit;
        self
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = Some(data_dir);
        self
    }

    pub fn store(&self) -> &SecretStore {
        &self.store
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the interactive API (`/api/projects/...`)
//! and the programmatic API (`/api/v1/secrets`). JSON is camelCase
//! throughout.
//!
//! Required request fields are declared as `Option` so that a missing field
//! is answered with the endpoint's own 400 message rather than a generic
//! deserialization rejection.
//!
//! ## Model Categories
//!
//! - **Projects**: create/update bodies and the nested details view
//! - **Environments**: create body and response
//! - **Secrets**: create/update/clear bodies, rollback
//! - **Audit**: ledger entries joined with the acting user's profile
//! - **Tokens**: token summaries (never the token value) and the one-time
//!   create response
//! - **Transfer**: export query, import result, fork
//! - **Programmatic API**: `/v1/secrets` query, read and write bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Permissions;
use crate::storage::repository::{
    Secret, StoredConfig, StoredEnvironment, StoredProject, StoredToken, UserProfile,
};
use crate::storage::{AuditAction, AuditLog, AuditMetadata};

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =============================================================================
// Projects
// =============================================================================

/// Body of project create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// A project with its whole tree.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: StoredProject,
    pub environments: Vec<EnvironmentDetails>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDetails {
    #[serde(flatten)]
    pub environment: StoredEnvironment,
    pub secret_configs: Vec<ConfigDetails>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDetails {
    #[serde(flatten)]
    pub config: StoredConfig,
    pub secrets: Vec<Secret>,
}

// =============================================================================
// Environments
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentRequest {
    pub name: Option<String>,
    pub display_name: Option<String>,
    /// 1-3 lowercase letters, unique within the project.
    pub shortcut: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnvironmentResponse {
    pub message: String,
    pub environment_id: String,
    /// ID of the default config created with the environment.
    pub config_id: String,
}

// =============================================================================
// Secrets
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
    pub key: Option<String>,
    pub value: Option<String>,
    /// One of the secret types; defaults to `text`.
    #[serde(rename = "type")]
    pub secret_type: Option<String>,
    pub secret_config_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecretRequest {
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub secret_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearSecretsRequest {
    pub secret_config_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Secret key to trace.
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub audit_log_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub message: String,
    /// Action of the inverse entry that was written.
    pub action: AuditAction,
    pub details: String,
}

// =============================================================================
// Audit
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Maximum number of entries; defaults to the server's audit page size.
    pub limit: Option<usize>,
}

/// A ledger entry as shown to the project owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: String,
    pub action: AuditAction,
    pub details: String,
    #[schema(value_type = Object)]
    pub metadata: AuditMetadata,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl AuditLogEntry {
    pub fn new(log: AuditLog, profile: Option<&UserProfile>) -> Self {
        Self {
            id: log.id,
            action: log.action,
            details: log.details,
            metadata: log.metadata,
            timestamp: log.timestamp,
            user_id: log.user_id,
            user_name: profile.and_then(|p| p.name.clone()),
            user_email: profile.and_then(|p| p.email.clone()),
        }
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// A token without its secret value.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub id: String,
    pub name: String,
    /// First characters of the token, for recognition.
    pub token_prefix: String,
    #[schema(value_type = Object)]
    pub permissions: Permissions,
    pub is_active: bool,
    pub last_used: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredToken> for TokenSummary {
    fn from(token: StoredToken) -> Self {
        Self {
            id: token.id,
            name: token.name,
            token_prefix: token.token_prefix,
            permissions: token.permissions,
            is_active: token.is_active,
            last_used: token.last_used,
            expires_at: token.expires_at,
            created_at: token.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenRequest {
    pub name: Option<String>,
    /// `{"admin": true}` or `{"environments": {"<name or *>": ["read", "write", "*"]}}`.
    #[schema(value_type = Object)]
    pub permissions: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Create response; the only time the token value is returned.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenResponse {
    #[serde(flatten)]
    pub summary: TokenSummary,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTokenRequest {
    pub is_active: Option<bool>,
    pub name: Option<String>,
    #[schema(value_type = Object)]
    pub permissions: Option<serde_json::Value>,
}

// =============================================================================
// Transfer (export, import, fork)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    pub environment_id: Option<String>,
    pub secret_config_id: Option<String>,
    /// `env` (default), `json`, `yaml` or `csv`.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub message: String,
    pub imported: usize,
    pub skipped: usize,
    /// Entries with an empty key or a key repeated within the file.
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForkRequest {
    pub source_config_id: Option<String>,
    pub new_config_name: Option<String>,
    /// Environment receiving the new config.
    pub environment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForkResponse {
    pub message: String,
    pub new_config: StoredConfig,
    pub new_config_id: String,
    pub copied_secrets: usize,
}

// =============================================================================
// Programmatic API
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SecretsQuery {
    /// Environment name; defaults to `development`.
    pub environment: Option<String>,
    /// Config name; defaults to `default`.
    pub config: Option<String>,
    /// `env` or `json` (default).
    pub format: Option<String>,
}

/// Secrets of one config as a JSON document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SecretsDocument {
    /// Project name.
    pub project: String,
    pub environment: String,
    pub config: String,
    /// Key to value, in secret order.
    #[schema(value_type = Object)]
    pub secrets: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WriteSecretsRequest {
    pub environment: Option<String>,
    pub config: Option<String>,
    /// Key to string value.
    #[schema(value_type = Object)]
    pub secrets: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WriteSecretsResponse {
    pub message: String,
    pub created: usize,
    pub updated: usize,
    /// Keys whose value was not a string.
    pub rejected: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use crate::auth::TokenAction;

    #[test]
    fn token_summary_never_carries_the_hash() {
        let now = Utc::now();
        let token = StoredToken {
            id: "t1".to_string(),
            name: "ci".to_string(),
            token_hash: "deadbeef".to_string(),
            token_prefix: "crypt_abcdef".to_string(),
            user_id: "u1".to_string(),
            project_id: Some("p1".to_string()),
            permissions: Permissions::Scoped(BTreeMap::from([(
                "production".to_string(),
                BTreeSet::from([TokenAction::Read]),
            )])),
            is_active: true,
            expires_at: None,
            last_used: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(TokenSummary::from(token)).unwrap();
        assert!(json.get("tokenHash").is_none());
        assert!(json.get("token").is_none());
        assert_eq!(json["tokenPrefix"], "crypt_abcdef");
        assert_eq!(json["permissions"]["environments"]["production"][0], "read");
    }

    #[test]
    fn details_flatten_parent_fields() {
        let project = StoredProject::new("u1", "P1", None, None);
        let environment = StoredEnvironment::new(&project.id, "dev", "Development", "dev", 0);
        let config = StoredConfig::new(&environment.id, "dev");
        let details = ProjectDetails {
            project,
            environments: vec![EnvironmentDetails {
                environment,
                secret_configs: vec![ConfigDetails {
                    config,
                    secrets: vec![],
                }],
            }],
        };

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["name"], "P1");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["environments"][0]["displayName"], "Development");
        assert_eq!(json["environments"][0]["secretConfigs"][0]["name"], "dev");
    }

    #[test]
    fn create_secret_request_reads_type_field() {
        let request: CreateSecretRequest = serde_json::from_str(
            r#"{"key":"PORT","value":"5432","type":"integer","secretConfigId":"c1"}"#,
        )
        .unwrap();
        assert_eq!(request.secret_type.as_deref(), Some("integer"));
        assert_eq!(request.secret_config_id.as_deref(), Some("c1"));
    }
}

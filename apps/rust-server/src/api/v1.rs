// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Programmatic secrets API, authenticated by API token.
//!
//! The environment and config are addressed by name within the token's
//! project. The permission check runs before the lookup, so a token
//! without access to an environment gets 403 whether or not the
//! environment exists.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::{
    auth::{TokenAction, TokenAuth},
    error::ApiError,
    models::{SecretsDocument, SecretsQuery, WriteSecretsRequest, WriteSecretsResponse},
    state::AppState,
    storage::{
        AuditAction, AuditEntry, AuditLedger, AuditMetadata, ConfigRepository,
        EnvironmentRepository, NewSecret, Reader, SecretRepository, SecretType, StoreError,
        StoreResult, StoredConfig, StoredEnvironment, StoredProject,
    },
    vault::formats,
};

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_CONFIG: &str = "default";

fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    value.as_deref().filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Environment and config of the project by name.
fn resolve<T: Reader>(
    txn: &T,
    project: &StoredProject,
    environment: &str,
    config: &str,
) -> StoreResult<(StoredEnvironment, StoredConfig)> {
    let not_found =
        || StoreError::NotFound(format!("Environment \"{environment}\" or config \"{config}\" not found"));
    let environment_row = EnvironmentRepository::new(txn)
        .find_by_name(&project.id, environment)?
        .ok_or_else(not_found)?;
    let config_row = ConfigRepository::new(txn)
        .find_by_name(&environment_row.id, config)?
        .ok_or_else(not_found)?;
    Ok((environment_row, config_row))
}

/// Read the secrets of a config as `KEY=value` lines (`format=env`) or a
/// JSON document.
#[utoipa::path(
    get,
    path = "/api/v1/secrets",
    tag = "Programmatic API",
    security(("api_token" = [])),
    params(SecretsQuery),
    responses(
        (status = 200, description = "Secrets of the config", body = SecretsDocument),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Environment or config not found")
    )
)]
pub async fn read_secrets(
    TokenAuth(token): TokenAuth,
    State(state): State<AppState>,
    Query(query): Query<SecretsQuery>,
) -> Result<Response, ApiError> {
    let environment = or_default(&query.environment, DEFAULT_ENVIRONMENT);
    let config = or_default(&query.config, DEFAULT_CONFIG);
    token.authorize(TokenAction::Read, environment)?;

    let secrets = state.store.read(|txn| {
        let (_, config_row) = resolve(txn, &token.project, environment, config)?;
        SecretRepository::new(txn, state.store.sealer()).list_by_config(&config_row.id)
    })?;

    tracing::debug!(
        token_id = %token.token_id,
        environment = %environment,
        config = %config,
        count = secrets.len(),
        "Secrets read through API token"
    );

    if query.format.as_deref() == Some("env") {
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            formats::to_env(&secrets),
        )
            .into_response());
    }

    Ok(Json(SecretsDocument {
        project: token.project.name.clone(),
        environment: environment.to_string(),
        config: config.to_string(),
        secrets: secrets
            .into_iter()
            .map(|secret| (secret.key, Value::String(secret.value)))
            .collect(),
    })
    .into_response())
}

/// Create or update secrets of a config.
///
/// Every key of `secrets` with a string value is upserted; keys with any
/// other value are listed in `rejected` and left untouched.
#[utoipa::path(
    post,
    path = "/api/v1/secrets",
    tag = "Programmatic API",
    security(("api_token" = [])),
    request_body = WriteSecretsRequest,
    responses(
        (status = 200, description = "Secrets written", body = WriteSecretsResponse),
        (status = 400, description = "Invalid secrets data"),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Insufficient permissions"),
        (status = 404, description = "Environment or config not found")
    )
)]
pub async fn write_secrets(
    TokenAuth(token): TokenAuth,
    State(state): State<AppState>,
    Json(request): Json<WriteSecretsRequest>,
) -> Result<Json<WriteSecretsResponse>, ApiError> {
    let environment = or_default(&request.environment, DEFAULT_ENVIRONMENT);
    let config = or_default(&request.config, DEFAULT_CONFIG);
    token.authorize(TokenAction::Write, environment)?;

    let Some(Value::Object(entries)) = &request.secrets else {
        return Err(ApiError::bad_request("Invalid secrets data"));
    };

    let response = state.store.write(|txn| {
        let (environment_row, config_row) = resolve(txn, &token.project, environment, config)?;
        let secrets = SecretRepository::new(txn, state.store.sealer());
        let ledger = AuditLedger::new(txn, state.store.sealer());
        let metadata = |key: &str| AuditMetadata {
            secret_key: Some(key.to_string()),
            config_name: Some(config_row.name.clone()),
            secret_config_id: Some(config_row.id.clone()),
            environment_name: Some(environment_row.display_name.clone()),
            ..Default::default()
        };

        let mut response = WriteSecretsResponse {
            message: "Secrets updated successfully".to_string(),
            created: 0,
            updated: 0,
            rejected: Vec::new(),
        };

        for (key, value) in entries {
            let Value::String(value) = value else {
                response.rejected.push(key.clone());
                continue;
            };
            if key.is_empty() {
                response.rejected.push(key.clone());
                continue;
            }

            match secrets.find_by_key(&config_row.id, key)? {
                Some(existing) => {
                    let secret = secrets.update_value(&existing.id, value, None)?;
                    ledger.record(
                        &token.project.id,
                        &token.user_id,
                        AuditEntry::new(
                            AuditAction::SecretUpdated,
                            format!("Updated secret \"{key}\" in {} via API", config_row.name),
                        )
                        .with_metadata(AuditMetadata {
                            old_value: Some(existing.value),
                            new_value: Some(secret.value),
                            secret_type: Some(secret.secret_type.to_string()),
                            ..metadata(key.as_str())
                        }),
                    );
                    response.updated += 1;
                }
                None => {
                    let secret = secrets.insert(NewSecret {
                        secret_config_id: &config_row.id,
                        key,
                        value,
                        secret_type: SecretType::Text,
                        order: secrets.next_order(&config_row.id)?,
                    })?;
                    ledger.record(
                        &token.project.id,
                        &token.user_id,
                        AuditEntry::new(
                            AuditAction::SecretCreated,
                            format!("Created secret \"{key}\" in {} via API", config_row.name),
                        )
                        .with_metadata(AuditMetadata {
                            new_value: Some(secret.value),
                            secret_type: Some(secret.secret_type.to_string()),
                            ..metadata(key.as_str())
                        }),
                    );
                    response.created += 1;
                }
            }
        }

        Ok::<_, ApiError>(response)
    })?;

    tracing::info!(
        token_id = %token.token_id,
        project_id = %token.project.id,
        environment = %environment,
        config = %config,
        created = response.created,
        updated = response.updated,
        rejected = response.rejected.len(),
        "Secrets written through API token"
    );

    Ok(Json(response))
}

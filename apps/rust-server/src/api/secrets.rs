// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret API endpoints.
//!
//! Every mutation writes a ledger entry in the same transaction. The
//! `secret_*` entries carry `secretKey`, `configName` and `secretConfigId`
//! plus the values the rollback engine needs to invert them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::required;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        ClearSecretsRequest, CreateSecretRequest, HistoryQuery, MessageResponse, RollbackRequest,
        RollbackResponse, UpdateSecretRequest,
    },
    state::AppState,
    storage::{
        AuditAction, AuditEntry, AuditLedger, AuditLog, AuditMetadata, NewSecret, OwnershipChain,
        Secret, SecretRepository, SecretType,
    },
    vault,
};

fn parse_type(value: Option<&str>) -> Result<Option<SecretType>, ApiError> {
    value
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<SecretType>().map_err(ApiError::from))
        .transpose()
}

/// Create a secret in a config. Its `order` is one past the config's
/// current maximum.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/secrets",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = CreateSecretRequest,
    responses(
        (status = 201, description = "Secret created", body = Secret),
        (status = 400, description = "Missing field, unknown type or duplicate key"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or config not found")
    )
)]
pub async fn create_secret(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<CreateSecretRequest>,
) -> Result<(StatusCode, Json<Secret>), ApiError> {
    let (Some(key), Some(value), Some(config_id)) = (
        required(&request.key),
        request.value.as_deref().filter(|v| !v.is_empty()),
        required(&request.secret_config_id),
    ) else {
        return Err(ApiError::bad_request(
            "Key, value, and secretConfigId are required",
        ));
    };
    let secret_type = parse_type(request.secret_type.as_deref())?.unwrap_or_default();

    let secret = state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (environment, config) = chain.config(&project, config_id)?;

        let secrets = SecretRepository::new(txn, state.store.sealer());
        let secret = secrets.insert(NewSecret {
            secret_config_id: &config.id,
            key,
            value,
            secret_type,
            order: secrets.next_order(&config.id)?,
        })?;

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::SecretCreated,
                format!("Created secret \"{}\" in {}", secret.key, config.name),
            )
            .with_metadata(AuditMetadata {
                secret_key: Some(secret.key.clone()),
                new_value: Some(secret.value.clone()),
                secret_type: Some(secret.secret_type.to_string()),
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                environment_name: Some(environment.display_name.clone()),
                ..Default::default()
            }),
        );

        Ok::<_, ApiError>(secret)
    })?;

    Ok((StatusCode::CREATED, Json(secret)))
}

/// Change the value and/or type of a secret.
#[utoipa::path(
    patch,
    path = "/api/projects/{id}/secrets/{secret_id}",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Project ID"),
        ("secret_id" = String, Path, description = "Secret ID")
    ),
    request_body = UpdateSecretRequest,
    responses(
        (status = 200, description = "Updated secret", body = Secret),
        (status = 400, description = "Nothing to update or unknown type"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or secret not found")
    )
)]
pub async fn update_secret(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((project_id, secret_id)): Path<(String, String)>,
    Json(request): Json<UpdateSecretRequest>,
) -> Result<Json<Secret>, ApiError> {
    let secret_type = parse_type(request.secret_type.as_deref())?;
    if request.value.is_none() && secret_type.is_none() {
        return Err(ApiError::bad_request("Value or type is required"));
    }

    let secret = state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (environment, config, existing) =
            chain.secret(&project, &secret_id, state.store.sealer())?;

        let value = request.value.as_deref().unwrap_or(&existing.value);
        let secret = SecretRepository::new(txn, state.store.sealer())
            .update_value(&existing.id, value, secret_type)?;

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::SecretUpdated,
                format!("Updated secret \"{}\" in {}", secret.key, config.name),
            )
            .with_metadata(AuditMetadata {
                secret_key: Some(secret.key.clone()),
                old_value: Some(existing.value.clone()),
                new_value: Some(secret.value.clone()),
                secret_type: Some(secret.secret_type.to_string()),
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                environment_name: Some(environment.display_name.clone()),
                ..Default::default()
            }),
        );

        Ok::<_, ApiError>(secret)
    })?;

    Ok(Json(secret))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}/secrets/{secret_id}",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Project ID"),
        ("secret_id" = String, Path, description = "Secret ID")
    ),
    responses(
        (status = 200, description = "Secret deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or secret not found")
    )
)]
pub async fn delete_secret(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((project_id, secret_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (environment, config, secret) =
            chain.secret(&project, &secret_id, state.store.sealer())?;

        SecretRepository::new(txn, state.store.sealer()).delete(&secret.id)?;

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::SecretDeleted,
                format!("Deleted secret \"{}\" from {}", secret.key, config.name),
            )
            .with_metadata(AuditMetadata {
                secret_key: Some(secret.key.clone()),
                old_value: Some(secret.value.clone()),
                secret_type: Some(secret.secret_type.to_string()),
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                environment_name: Some(environment.display_name.clone()),
                ..Default::default()
            }),
        );

        Ok::<_, ApiError>(())
    })?;

    Ok(Json(MessageResponse::new("Secret deleted successfully")))
}

/// Delete every secret of a config. Clearing an empty config succeeds and
/// is still recorded.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/secrets/clear",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = ClearSecretsRequest,
    responses(
        (status = 200, description = "Secrets cleared", body = MessageResponse),
        (status = 400, description = "secretConfigId is required"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or config not found")
    )
)]
pub async fn clear_secrets(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<ClearSecretsRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(config_id) = required(&request.secret_config_id) else {
        return Err(ApiError::bad_request("secretConfigId is required"));
    };

    let cleared = state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (environment, config) = chain.config(&project, config_id)?;

        let cleared = SecretRepository::new(txn, state.store.sealer()).clear(&config.id)?;

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::SecretBulkClear,
                format!("Cleared {} secrets from {}", cleared, config.name),
            )
            .with_metadata(AuditMetadata {
                secrets_count: Some(cleared),
                config_name: Some(config.name.clone()),
                secret_config_id: Some(config.id.clone()),
                environment_name: Some(environment.display_name.clone()),
                ..Default::default()
            }),
        );

        Ok::<_, ApiError>(cleared)
    })?;

    tracing::info!(project_id = %project_id, config_id = %config_id, cleared, "Secrets cleared");

    Ok(Json(MessageResponse::new("Secrets cleared successfully")))
}

/// Ledger entries naming a secret key, newest first.
#[utoipa::path(
    get,
    path = "/api/projects/{id}/secrets/history",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID"), HistoryQuery),
    responses(
        (status = 200, description = "History of the key", body = [AuditLog]),
        (status = 400, description = "key is required"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn secret_history(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<AuditLog>>, ApiError> {
    let Some(key) = required(&query.key) else {
        return Err(ApiError::bad_request("key is required"));
    };

    let history = state.store.read(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        AuditLedger::new(txn, state.store.sealer()).history(&project.id, key)
    })?;

    Ok(Json(history))
}

/// Apply the inverse of a `secret_created`, `secret_updated` or
/// `secret_deleted` entry.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/secrets/rollback",
    tag = "Secrets",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = RollbackRequest,
    responses(
        (status = 200, description = "Rollback applied", body = RollbackResponse),
        (status = 400, description = "Action not reversible, metadata missing or target gone"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or audit log not found")
    )
)]
pub async fn rollback_secret(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<RollbackRequest>,
) -> Result<Json<RollbackResponse>, ApiError> {
    let Some(audit_log_id) = required(&request.audit_log_id) else {
        return Err(ApiError::bad_request("auditLogId is required"));
    };

    let outcome = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        vault::rollback(txn, state.store.sealer(), &project, &user.user_id, audit_log_id)
    })?;

    Ok(Json(RollbackResponse {
        message: "Rollback completed successfully".to_string(),
        action: outcome.action,
        details: outcome.details,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, create_project, default_config, send};
    use crate::auth::extractor::tests::test_state;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn create_assigns_increasing_order() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 0).await;
        let uri = format!("/api/projects/{project_id}/secrets");

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"key": "DB_URL", "value": "postgres://x", "type": "text", "secretConfigId": config_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["order"], 1);

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"key": "PORT", "value": "5432", "type": "integer", "secretConfigId": config_id})),
        )
        .await;
        let secret = body_json(response).await;
        assert_eq!(secret["order"], 2);
        assert_eq!(secret["type"], "integer");

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"key": "PORT", "value": "1", "secretConfigId": config_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].as_str().unwrap().contains("PORT"));
    }

    #[tokio::test]
    async fn create_validates_input() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 0).await;
        let uri = format!("/api/projects/{project_id}/secrets");

        let response = send(&state, Method::POST, &uri, "alice", Some(json!({"key": "A"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Key, value, and secretConfigId are required"
        );

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"key": "A", "value": "1", "type": "float", "secretConfigId": config_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"key": "A", "value": "1", "secretConfigId": "nope"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Secret config not found");
    }

    #[tokio::test]
    async fn update_delete_and_history() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 0).await;

        let secret = body_json(
            send(
                &state,
                Method::POST,
                &format!("/api/projects/{project_id}/secrets"),
                "alice",
                Some(json!({"key": "API_KEY", "value": "v1", "secretConfigId": config_id})),
            )
            .await,
        )
        .await;
        let secret_uri = format!("/api/projects/{project_id}/secrets/{}", secret["id"].as_str().unwrap());

        let response = send(&state, Method::PATCH, &secret_uri, "alice", Some(json!({"value": "v2"}))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["value"], "v2");

        let response = send(&state, Method::DELETE, &secret_uri, "alice", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&state, Method::DELETE, &secret_uri, "alice", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let history = body_json(
            send(
                &state,
                Method::GET,
                &format!("/api/projects/{project_id}/secrets/history?key=API_KEY"),
                "alice",
                None,
            )
            .await,
        )
        .await;
        let actions: Vec<_> = history.as_array().unwrap().iter().map(|e| e["action"].as_str().unwrap()).collect();
        assert_eq!(actions, vec!["secret_deleted", "secret_updated", "secret_created"]);
        assert_eq!(history[1]["metadata"]["oldValue"], "v1");
        assert_eq!(history[0]["metadata"]["configName"], "dev");
    }

    #[tokio::test]
    async fn clear_empty_config_is_recorded() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 1).await;

        let response = send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets/clear"),
            "alice",
            Some(json!({"secretConfigId": config_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Secrets cleared successfully");

        let audit = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/audit"), "alice", None).await,
        )
        .await;
        assert_eq!(audit[0]["action"], "secret_bulk_clear");
        assert_eq!(audit[0]["metadata"]["secretsCount"], 0);
        assert_eq!(audit[0]["details"], "Cleared 0 secrets from stg");
    }

    #[tokio::test]
    async fn rollback_of_creation_deletes_the_secret() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 0).await;

        send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets"),
            "alice",
            Some(json!({"key": "TEMP", "value": "x", "secretConfigId": config_id})),
        )
        .await;
        let audit = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/audit"), "alice", None).await,
        )
        .await;
        let created_id = audit[0]["id"].as_str().unwrap().to_string();

        let response = send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets/rollback"),
            "alice",
            Some(json!({"auditLogId": created_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Rollback completed successfully");
        assert_eq!(body["action"], "secret_deleted");

        let audit = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/audit"), "alice", None).await,
        )
        .await;
        assert_eq!(audit[0]["action"], "secret_deleted");
        assert_eq!(audit[0]["metadata"]["originalAuditLogId"], created_id.as_str());

        let details = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/details"), "alice", None).await,
        )
        .await;
        assert!(details["environments"][0]["secretConfigs"][0]["secrets"]
            .as_array()
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn rollback_rejects_non_secret_entries() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let config_id = default_config(&state, &project_id, "alice", 0).await;

        send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets/clear"),
            "alice",
            Some(json!({"secretConfigId": config_id})),
        )
        .await;
        let audit = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/audit"), "alice", None).await,
        )
        .await;

        let response = send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets/rollback"),
            "alice",
            Some(json!({"auditLogId": audit[0]["id"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Cannot rollback this type of action");
    }
}

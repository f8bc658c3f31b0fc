// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Environment API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::required;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{CreateEnvironmentRequest, CreateEnvironmentResponse, MessageResponse},
    state::AppState,
    storage::{
        AuditAction, AuditEntry, AuditLedger, AuditMetadata, ConfigRepository,
        EnvironmentRepository, OwnershipChain, StoredEnvironment,
    },
};

/// Create an environment together with its default config.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/environments",
    tag = "Environments",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = CreateEnvironmentRequest,
    responses(
        (status = 201, description = "Environment created", body = CreateEnvironmentResponse),
        (status = 400, description = "Missing field, invalid or duplicate shortcut"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn create_environment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<CreateEnvironmentRequest>,
) -> Result<(StatusCode, Json<CreateEnvironmentResponse>), ApiError> {
    let (Some(name), Some(display_name), Some(shortcut)) = (
        required(&request.name),
        required(&request.display_name),
        required(&request.shortcut),
    ) else {
        return Err(ApiError::bad_request(
            "Name, displayName, and shortcut are required",
        ));
    };

    let (environment, config) = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        let environments = EnvironmentRepository::new(txn);
        let environment = StoredEnvironment::new(
            &project.id,
            name.trim(),
            display_name.trim(),
            shortcut.trim(),
            environments.next_order(&project.id)?,
        );
        let config = environments.create(&environment)?;

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::EnvironmentCreated,
                format!(
                    "Created environment \"{}\" ({})",
                    environment.display_name, environment.shortcut
                ),
            )
            .with_metadata(
                AuditMetadata {
                    environment_name: Some(environment.display_name.clone()),
                    config_name: Some(config.name.clone()),
                    secret_config_id: Some(config.id.clone()),
                    ..Default::default()
                }
                .with("shortcut", environment.shortcut.as_str()),
            ),
        );

        Ok::<_, ApiError>((environment, config))
    })?;

    tracing::info!(
        project_id = %environment.project_id,
        environment_id = %environment.id,
        shortcut = %environment.shortcut,
        "Environment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateEnvironmentResponse {
            message: "Environment created successfully".to_string(),
            environment_id: environment.id,
            config_id: config.id,
        }),
    ))
}

/// Delete an environment with all of its configs and secrets.
///
/// The ledger entry is written before the cascade so it can still name
/// the configs being removed.
#[utoipa::path(
    delete,
    path = "/api/projects/{id}/environments/{environment_id}",
    tag = "Environments",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Project ID"),
        ("environment_id" = String, Path, description = "Environment ID")
    ),
    responses(
        (status = 200, description = "Environment deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or environment not found")
    )
)]
pub async fn delete_environment(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((project_id, environment_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let counts = state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let environment = chain.environment(&project, &environment_id)?;

        let config_names: Vec<String> = ConfigRepository::new(txn)
            .list_by_environment(&environment.id)?
            .into_iter()
            .map(|config| config.name)
            .collect();

        AuditLedger::new(txn, state.store.sealer()).record(
            &project.id,
            &user.user_id,
            AuditEntry::new(
                AuditAction::EnvironmentDeleted,
                format!(
                    "Deleted environment \"{}\" with {} configs",
                    environment.display_name,
                    config_names.len()
                ),
            )
            .with_metadata(
                AuditMetadata {
                    environment_name: Some(environment.display_name.clone()),
                    ..Default::default()
                }
                .with("shortcut", environment.shortcut.as_str())
                .with("configNames", config_names),
            ),
        );

        Ok::<_, ApiError>(EnvironmentRepository::new(txn).delete_cascade(&environment)?)
    })?;

    tracing::info!(
        project_id = %project_id,
        environment_id = %environment_id,
        configs = counts.configs,
        secrets = counts.secrets,
        "Environment deleted"
    );

    Ok(Json(MessageResponse::new("Environment deleted successfully")))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Project management API endpoints.
//!
//! All operations require a session and are scoped to projects the caller
//! owns. Projects owned by someone else are reported as missing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::required;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ConfigDetails, EnvironmentDetails, MessageResponse, ProjectDetails, ProjectRequest},
    state::AppState,
    storage::{
        ConfigRepository, EnvironmentRepository, OwnershipChain, ProjectRepository,
        SecretRepository, StoredProject,
    },
};

fn project_name(request: &ProjectRequest) -> Result<&str, ApiError> {
    required(&request.name).ok_or_else(|| ApiError::bad_request("Name is required"))
}

/// List the caller's projects, newest first.
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Projects owned by the caller", body = [StoredProject]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_projects(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredProject>>, ApiError> {
    let projects = state
        .store
        .read(|txn| ProjectRepository::new(txn).list_by_owner(&user.user_id))?;
    Ok(Json(projects))
}

/// Create a project.
///
/// The project starts with the `dev`, `stg` and `prd` environments, each
/// holding an empty config named after its shortcut.
#[utoipa::path(
    post,
    path = "/api/projects",
    tag = "Projects",
    security(("bearer_auth" = [])),
    request_body = ProjectRequest,
    responses(
        (status = 201, description = "Project created", body = StoredProject),
        (status = 400, description = "Name is required"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_project(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<StoredProject>), ApiError> {
    let name = project_name(&request)?;
    let project = StoredProject::new(
        &user.user_id,
        name,
        request.description.clone(),
        request.icon.clone(),
    );

    let environments = state
        .store
        .write(|txn| ProjectRepository::new(txn).create(&project))?;

    tracing::info!(
        project_id = %project.id,
        user_id = %user.user_id,
        environments = environments.len(),
        "Project created"
    );

    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = StoredProject),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn get_project(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<StoredProject>, ApiError> {
    let project = state
        .store
        .read(|txn| OwnershipChain::new(txn).project(&user, &project_id))?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = ProjectRequest,
    responses(
        (status = 200, description = "Updated project", body = StoredProject),
        (status = 400, description = "Name is required"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn update_project(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<ProjectRequest>,
) -> Result<Json<StoredProject>, ApiError> {
    let name = project_name(&request)?;

    let project = state.store.write(|txn| {
        let mut project = OwnershipChain::new(txn).project(&user, &project_id)?;
        project.name = name.trim().to_string();
        project.description = request.description.clone();
        project.icon = request.icon.clone();
        project.updated_at = Utc::now();
        ProjectRepository::new(txn).update(&project)?;
        Ok::<_, ApiError>(project)
    })?;

    Ok(Json(project))
}

/// Delete a project with its environments, configs, secrets, audit log and
/// API tokens.
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn delete_project(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let purge = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        ProjectRepository::new(txn).delete_cascade(&project, state.store.sealer())
    })?;

    tracing::info!(
        project_id = %project_id,
        user_id = %user.user_id,
        environments = purge.environments,
        configs = purge.configs,
        secrets = purge.secrets,
        audit_logs = purge.audit_logs,
        tokens = purge.tokens,
        "Project deleted"
    );

    Ok(Json(MessageResponse::new("Project deleted successfully")))
}

/// The project with every environment, config and secret, each level in
/// display order.
#[utoipa::path(
    get,
    path = "/api/projects/{id}/details",
    tag = "Projects",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project tree", body = ProjectDetails),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn project_details(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectDetails>, ApiError> {
    let details = state.store.read(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        let configs = ConfigRepository::new(txn);
        let secrets = SecretRepository::new(txn, state.store.sealer());

        let mut environments = Vec::new();
        for environment in EnvironmentRepository::new(txn).list_by_project(&project.id)? {
            let mut secret_configs = Vec::new();
            for config in configs.list_by_environment(&environment.id)? {
                let secrets = secrets.list_by_config(&config.id)?;
                secret_configs.push(ConfigDetails { config, secrets });
            }
            environments.push(EnvironmentDetails {
                environment,
                secret_configs,
            });
        }

        Ok::<_, ApiError>(ProjectDetails {
            project,
            environments,
        })
    })?;

    Ok(Json(details))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, send};
    use crate::auth::extractor::tests::test_state;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn create_project_seeds_default_environments() {
        let (state, _dir) = test_state();

        let response = send(&state, Method::POST, "/api/projects", "alice", Some(json!({"name": "P1"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let project = body_json(response).await;
        let id = project["id"].as_str().unwrap();
        assert_eq!(project["userId"], "alice");

        let response = send(&state, Method::GET, &format!("/api/projects/{id}/details"), "alice", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let details = body_json(response).await;
        let environments = details["environments"].as_array().unwrap();
        let shortcuts: Vec<_> = environments.iter().map(|e| e["shortcut"].as_str().unwrap()).collect();
        assert_eq!(shortcuts, vec!["dev", "stg", "prd"]);
        for environment in environments {
            let configs = environment["secretConfigs"].as_array().unwrap();
            assert_eq!(configs.len(), 1);
            assert_eq!(configs[0]["name"], environment["shortcut"]);
            assert!(configs[0]["secrets"].as_array().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn create_project_requires_name() {
        let (state, _dir) = test_state();
        let response = send(&state, Method::POST, "/api/projects", "alice", Some(json!({"name": "  "}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Name is required");
    }

    #[tokio::test]
    async fn projects_are_private_to_their_owner() {
        let (state, _dir) = test_state();
        let response = send(&state, Method::POST, "/api/projects", "alice", Some(json!({"name": "P1"}))).await;
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = send(&state, Method::GET, &format!("/api/projects/{id}"), "mallory", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, Method::DELETE, &format!("/api/projects/{id}"), "mallory", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, Method::GET, "/api/projects", "mallory", None).await;
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn update_then_delete_project() {
        let (state, _dir) = test_state();
        let response = send(&state, Method::POST, "/api/projects", "alice", Some(json!({"name": "P1"}))).await;
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let response = send(
            &state,
            Method::PUT,
            &format!("/api/projects/{id}"),
            "alice",
            Some(json!({"name": "Renamed", "description": "infra"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let project = body_json(response).await;
        assert_eq!(project["name"], "Renamed");
        assert_eq!(project["description"], "infra");

        let response = send(&state, Method::DELETE, &format!("/api/projects/{id}"), "alice", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["message"], "Project deleted successfully");

        let response = send(&state, Method::GET, &format!("/api/projects/{id}"), "alice", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

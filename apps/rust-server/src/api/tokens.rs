// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API token management endpoints.
//!
//! Tokens are managed through the interactive API by the project owner.
//! The token value is shown once, in the create response; listings only
//! carry its display prefix.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::required;
use crate::{
    auth::{Auth, Permissions, TokenAuthority},
    error::ApiError,
    models::{
        CreateTokenRequest, CreateTokenResponse, MessageResponse, TokenSummary, UpdateTokenRequest,
    },
    state::AppState,
    storage::{OwnershipChain, TokenRepository},
};

fn parse_permissions(value: serde_json::Value) -> Result<Permissions, ApiError> {
    serde_json::from_value(value).map_err(|_| ApiError::bad_request("Invalid permissions"))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}/tokens",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Tokens of the project, newest first", body = [TokenSummary]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn list_tokens(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<TokenSummary>>, ApiError> {
    let tokens = state.store.read(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        TokenRepository::new(txn).list_by_project(&project.id)
    })?;

    Ok(Json(tokens.into_iter().map(TokenSummary::from).collect()))
}

/// Issue a token for the project.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/tokens",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = CreateTokenRequest,
    responses(
        (status = 201, description = "Token issued; `token` is not retrievable later", body = CreateTokenResponse),
        (status = 400, description = "Missing name or invalid permissions"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn create_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    let (Some(name), Some(permissions)) = (required(&request.name), request.permissions.clone())
    else {
        return Err(ApiError::bad_request("Name and permissions are required"));
    };
    let permissions = parse_permissions(permissions)?;

    let issued = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        TokenAuthority::new(txn).issue(
            &user.user_id,
            &project.id,
            name.trim(),
            permissions,
            request.expires_at,
        )
    })?;

    tracing::info!(
        project_id = %project_id,
        token_id = %issued.token.id,
        user_id = %user.user_id,
        "API token issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateTokenResponse {
            summary: TokenSummary::from(issued.token),
            token: issued.plaintext,
        }),
    ))
}

/// Enable/disable, rename or re-scope a token.
#[utoipa::path(
    patch,
    path = "/api/projects/{id}/tokens/{token_id}",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Project ID"),
        ("token_id" = String, Path, description = "Token ID")
    ),
    request_body = UpdateTokenRequest,
    responses(
        (status = 200, description = "Updated token", body = TokenSummary),
        (status = 400, description = "Invalid name or permissions"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or token not found")
    )
)]
pub async fn update_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((project_id, token_id)): Path<(String, String)>,
    Json(request): Json<UpdateTokenRequest>,
) -> Result<Json<TokenSummary>, ApiError> {
    let name = match &request.name {
        Some(_) => Some(
            required(&request.name)
                .ok_or_else(|| ApiError::bad_request("Name cannot be empty"))?,
        ),
        None => None,
    };
    let permissions = request.permissions.clone().map(parse_permissions).transpose()?;

    let token = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        let tokens = TokenRepository::new(txn);
        let mut token = tokens.get_in_project(&project.id, &token_id)?;

        if let Some(is_active) = request.is_active {
            token.is_active = is_active;
        }
        if let Some(name) = name {
            token.name = name.trim().to_string();
        }
        if let Some(permissions) = permissions {
            token.permissions = permissions;
        }
        token.updated_at = Utc::now();
        tokens.update(&token)?;
        Ok::<_, ApiError>(token)
    })?;

    tracing::info!(
        project_id = %project_id,
        token_id = %token.id,
        is_active = token.is_active,
        "API token updated"
    );

    Ok(Json(TokenSummary::from(token)))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}/tokens/{token_id}",
    tag = "Tokens",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "Project ID"),
        ("token_id" = String, Path, description = "Token ID")
    ),
    responses(
        (status = 200, description = "Token deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project or token not found")
    )
)]
pub async fn delete_token(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path((project_id, token_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        let tokens = TokenRepository::new(txn);
        let token = tokens.get_in_project(&project.id, &token_id)?;
        tokens.delete(&token)
    })?;

    tracing::info!(project_id = %project_id, token_id = %token_id, "API token deleted");

    Ok(Json(MessageResponse::new("Token deleted successfully")))
}

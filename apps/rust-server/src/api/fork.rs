// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::required;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ForkRequest, ForkResponse},
    state::AppState,
    storage::OwnershipChain,
    vault,
};

/// Copy a config and all of its secrets into a new config.
///
/// The new name must be a valid identifier and free in the target
/// environment. The source config is never modified.
#[utoipa::path(
    post,
    path = "/api/projects/{id}/fork",
    tag = "Transfer",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body = ForkRequest,
    responses(
        (status = 201, description = "Config forked", body = ForkResponse),
        (status = 400, description = "Missing field, invalid or duplicate name"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project, source config or target environment not found")
    )
)]
pub async fn fork_config(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<ForkRequest>,
) -> Result<(StatusCode, Json<ForkResponse>), ApiError> {
    let (Some(source_config_id), Some(new_name), Some(environment_id)) = (
        required(&request.source_config_id),
        required(&request.new_config_name),
        required(&request.environment_id),
    ) else {
        return Err(ApiError::bad_request(
            "sourceConfigId, newConfigName, and environmentId are required",
        ));
    };

    let outcome = state.store.write(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        vault::fork_config(
            txn,
            state.store.sealer(),
            &project,
            &user.user_id,
            source_config_id,
            new_name,
            environment_id,
        )
    })?;

    Ok((
        StatusCode::CREATED,
        Json(ForkResponse {
            message: "Config forked successfully".to_string(),
            new_config_id: outcome.config.id.clone(),
            new_config: outcome.config,
            copied_secrets: outcome.copied,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, create_project, send};
    use crate::auth::extractor::tests::test_state;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn fork_copies_secrets_and_rejects_duplicate_names() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let details = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/details"), "alice", None).await,
        )
        .await;
        let env_id = details["environments"][0]["id"].as_str().unwrap().to_string();
        let config_id = details["environments"][0]["secretConfigs"][0]["id"]
            .as_str()
            .unwrap()
            .to_string();
        send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets"),
            "alice",
            Some(json!({"key": "DB_URL", "value": "postgres://x", "secretConfigId": config_id})),
        )
        .await;

        let uri = format!("/api/projects/{project_id}/fork");
        let body = json!({"sourceConfigId": config_id, "newConfigName": "dev_local", "environmentId": env_id});

        let response = send(&state, Method::POST, &uri, "alice", Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let forked = body_json(response).await;
        assert_eq!(forked["message"], "Config forked successfully");
        assert_eq!(forked["newConfig"]["name"], "dev_local");
        assert_eq!(forked["newConfigId"], forked["newConfig"]["id"]);
        assert_eq!(forked["copiedSecrets"], 1);

        let response = send(&state, Method::POST, &uri, "alice", Some(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            Method::POST,
            &uri,
            "alice",
            Some(json!({"sourceConfigId": config_id, "newConfigName": "1bad", "environmentId": env_id})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, Method::POST, &uri, "alice", Some(json!({"sourceConfigId": config_id}))).await;
        assert_eq!(
            body_json(response).await["error"],
            "sourceConfigId, newConfigName, and environmentId are required"
        );

        let audit = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/audit"), "alice", None).await,
        )
        .await;
        assert_eq!(audit[0]["action"], "config_forked");
        assert_eq!(audit[0]["metadata"]["sourceConfigName"], "dev");
        assert_eq!(audit[0]["metadata"]["newConfigName"], "dev_local");
    }
}

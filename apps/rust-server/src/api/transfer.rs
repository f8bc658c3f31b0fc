// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Export and import of a config's secrets as env, JSON, YAML or CSV files.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use super::required;
use crate::{
    auth::Auth,
    error::ApiError,
    models::{ExportQuery, ImportResponse},
    state::AppState,
    storage::{OwnershipChain, SecretRepository},
    vault::{self, formats, TransferFormat},
};

fn transfer_format(value: Option<&str>) -> Result<TransferFormat, ApiError> {
    match value.filter(|f| !f.is_empty()) {
        Some(format) => Ok(format.parse::<TransferFormat>()?),
        None => Ok(TransferFormat::default()),
    }
}

/// Download a config as a file named `<config>.<ext>`.
#[utoipa::path(
    get,
    path = "/api/projects/{id}/export",
    tag = "Transfer",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID"), ExportQuery),
    responses(
        (status = 200, description = "Exported file", content_type = "text/plain", body = String),
        (status = 400, description = "Missing parameter or unsupported format"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project, environment or config not found")
    )
)]
pub async fn export_secrets(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(environment_id), Some(config_id)) = (
        required(&query.environment_id),
        required(&query.secret_config_id),
    ) else {
        return Err(ApiError::bad_request(
            "environmentId and secretConfigId are required",
        ));
    };
    let format = transfer_format(query.format.as_deref())?;

    let (config, content) = state.store.read(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (_, config) = chain.config_in_environment(&project, environment_id, config_id)?;
        let secrets = SecretRepository::new(txn, state.store.sealer()).list_by_config(&config.id)?;
        let content = formats::export(format, &secrets)?;
        Ok::<_, ApiError>((config, content))
    })?;

    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        config.name,
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    ))
}

/// Multipart fields of an import.
#[derive(Debug, Default)]
struct ImportForm {
    file: Option<String>,
    environment_id: Option<String>,
    secret_config_id: Option<String>,
    format: Option<String>,
    overwrite: bool,
}

impl ImportForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = ImportForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {e}")))?;
            match name.as_str() {
                "file" => form.file = Some(text),
                "environmentId" => form.environment_id = Some(text),
                "secretConfigId" => form.secret_config_id = Some(text),
                "format" => form.format = Some(text),
                "overwrite" => form.overwrite = text == "true",
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Upload a file into a config.
///
/// Form fields: `file`, `environmentId`, `secretConfigId`, `format`
/// (default `env`) and `overwrite` (`"true"` replaces every existing
/// secret; otherwise existing keys are skipped).
#[utoipa::path(
    post,
    path = "/api/projects/{id}/import",
    tag = "Transfer",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "file, environmentId, secretConfigId, format, overwrite"),
    responses(
        (status = 200, description = "Import result", body = ImportResponse),
        (status = 400, description = "Missing field, unsupported format or unparseable file"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project, environment or config not found")
    )
)]
pub async fn import_secrets(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let form = ImportForm::read(multipart).await?;
    let (Some(file), Some(environment_id), Some(config_id)) = (
        form.file.as_deref(),
        required(&form.environment_id),
        required(&form.secret_config_id),
    ) else {
        return Err(ApiError::bad_request(
            "File, environmentId, and secretConfigId are required",
        ));
    };
    let format = transfer_format(form.format.as_deref())?;
    let entries = formats::parse(format, file)?;

    let outcome = state.store.write(|txn| {
        let chain = OwnershipChain::new(txn);
        let project = chain.project(&user, &project_id)?;
        let (_, config) = chain.config_in_environment(&project, environment_id, config_id)?;
        vault::import_into(
            txn,
            state.store.sealer(),
            &project,
            &user.user_id,
            &config,
            &entries,
            form.overwrite,
        )
    })?;

    Ok(Json(ImportResponse {
        message: "Import completed".to_string(),
        imported: outcome.imported,
        skipped: outcome.skipped,
        failed: outcome.failed,
        total: outcome.total,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{body_json, create_project, default_config, send, send_request};
    use crate::auth::extractor::tests::{session_jwt, test_state};
    use crate::state::AppState;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::json;

    const BOUNDARY: &str = "crypt-test-boundary";

    async fn import(
        state: &AppState,
        project_id: &str,
        fields: &[(&str, &str)],
        file: Option<&str>,
    ) -> axum::response::Response {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        if let Some(content) = file {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/projects/{project_id}/import"))
            .header(header::AUTHORIZATION, format!("Bearer {}", session_jwt("alice")))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        send_request(state, request).await
    }

    async fn dev_ids(state: &AppState, project_id: &str) -> (String, String) {
        let details = body_json(
            send(state, Method::GET, &format!("/api/projects/{project_id}/details"), "alice", None).await,
        )
        .await;
        let dev = &details["environments"][0];
        (
            dev["id"].as_str().unwrap().to_string(),
            dev["secretConfigs"][0]["id"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn export_sets_attachment_name_and_typed_values() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let (env_id, config_id) = dev_ids(&state, &project_id).await;
        for (key, value, kind) in [("PORT", "5432", "integer"), ("DEBUG", "true", "boolean")] {
            send(
                &state,
                Method::POST,
                &format!("/api/projects/{project_id}/secrets"),
                "alice",
                Some(json!({"key": key, "value": value, "type": kind, "secretConfigId": config_id})),
            )
            .await;
        }

        let response = send(
            &state,
            Method::GET,
            &format!("/api/projects/{project_id}/export?environmentId={env_id}&secretConfigId={config_id}&format=json"),
            "alice",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dev.json\""
        );
        let body: serde_json::Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body, json!({"PORT": 5432, "DEBUG": true}));

        let response = send(
            &state,
            Method::GET,
            &format!("/api/projects/{project_id}/export?environmentId={env_id}&secretConfigId={config_id}"),
            "alice",
            None,
        )
        .await;
        let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
        assert_eq!(text, "PORT=5432\nDEBUG=true");
    }

    #[tokio::test]
    async fn export_rejects_bad_parameters() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let (env_id, config_id) = dev_ids(&state, &project_id).await;

        let response = send(
            &state,
            Method::GET,
            &format!("/api/projects/{project_id}/export?environmentId={env_id}"),
            "alice",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            Method::GET,
            &format!("/api/projects/{project_id}/export?environmentId={env_id}&secretConfigId={config_id}&format=toml"),
            "alice",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Unsupported format");
    }

    #[tokio::test]
    async fn import_env_file_skips_existing_keys() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let (env_id, config_id) = dev_ids(&state, &project_id).await;
        send(
            &state,
            Method::POST,
            &format!("/api/projects/{project_id}/secrets"),
            "alice",
            Some(json!({"key": "A", "value": "old", "secretConfigId": config_id})),
        )
        .await;

        let response = import(
            &state,
            &project_id,
            &[("environmentId", env_id.as_str()), ("secretConfigId", config_id.as_str())],
            Some("# comment\nA=new\nB=\"quoted\"\n"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Import completed");
        assert_eq!(body["imported"], 1);
        assert_eq!(body["skipped"], 1);
        assert_eq!(body["failed"], 0);
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn json_export_imports_back_with_overwrite() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let (env_id, config_id) = dev_ids(&state, &project_id).await;
        for (key, value, kind) in [("URL", "https://x", "url"), ("RETRIES", "3", "integer")] {
            send(
                &state,
                Method::POST,
                &format!("/api/projects/{project_id}/secrets"),
                "alice",
                Some(json!({"key": key, "value": value, "type": kind, "secretConfigId": config_id})),
            )
            .await;
        }
        let response = send(
            &state,
            Method::GET,
            &format!("/api/projects/{project_id}/export?environmentId={env_id}&secretConfigId={config_id}&format=json"),
            "alice",
            None,
        )
        .await;
        let exported = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();

        let details = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/details"), "alice", None).await,
        )
        .await;
        let stg = &details["environments"][1];
        let stg_env = stg["id"].as_str().unwrap().to_string();
        let stg_config = default_config(&state, &project_id, "alice", 1).await;

        let response = import(
            &state,
            &project_id,
            &[
                ("environmentId", stg_env.as_str()),
                ("secretConfigId", stg_config.as_str()),
                ("format", "json"),
                ("overwrite", "true"),
            ],
            Some(&exported),
        )
        .await;
        assert_eq!(body_json(response).await["imported"], 2);

        let details = body_json(
            send(&state, Method::GET, &format!("/api/projects/{project_id}/details"), "alice", None).await,
        )
        .await;
        let pairs: Vec<(String, String)> = details["environments"][1]["secretConfigs"][0]["secrets"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| (s["key"].as_str().unwrap().to_string(), s["value"].as_str().unwrap().to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("URL".to_string(), "https://x".to_string()),
                ("RETRIES".to_string(), "3".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn import_requires_fields_and_parseable_file() {
        let (state, _dir) = test_state();
        let project_id = create_project(&state, "alice").await;
        let (env_id, config_id) = dev_ids(&state, &project_id).await;

        let response = import(&state, &project_id, &[("environmentId", env_id.as_str())], Some("A=1")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "File, environmentId, and secretConfigId are required"
        );

        let response = import(
            &state,
            &project_id,
            &[("environmentId", env_id.as_str()), ("secretConfigId", config_id.as_str()), ("format", "json")],
            Some("{not json"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Failed to parse file");
    }
}

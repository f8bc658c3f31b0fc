// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        AuditLogEntry, ClearSecretsRequest, ConfigDetails, CreateEnvironmentRequest,
        CreateEnvironmentResponse, CreateSecretRequest, CreateTokenRequest, CreateTokenResponse,
        EnvironmentDetails, ForkRequest, ForkResponse, ImportResponse, MessageResponse,
        ProjectDetails, ProjectRequest, RollbackRequest, RollbackResponse, SecretsDocument,
        TokenSummary, UpdateSecretRequest, UpdateTokenRequest, WriteSecretsRequest,
        WriteSecretsResponse,
    },
    state::AppState,
    storage::{AuditAction, AuditLog, Secret, SecretType, StoredConfig, StoredEnvironment, StoredProject},
};

pub mod audit;
pub mod environments;
pub mod fork;
pub mod health;
pub mod projects;
pub mod secrets;
pub mod tokens;
pub mod transfer;
pub mod v1;

/// Returns the field when it is present and not blank.
pub(crate) fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let project_routes = Router::new()
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{id}/details", get(projects::project_details))
        .route(
            "/projects/{id}/environments",
            post(environments::create_environment),
        )
        .route(
            "/projects/{id}/environments/{environment_id}",
            delete(environments::delete_environment),
        )
        .route("/projects/{id}/secrets", post(secrets::create_secret))
        .route("/projects/{id}/secrets/clear", post(secrets::clear_secrets))
        .route("/projects/{id}/secrets/history", get(secrets::secret_history))
        .route(
            "/projects/{id}/secrets/rollback",
            post(secrets::rollback_secret),
        )
        .route(
            "/projects/{id}/secrets/{secret_id}",
            patch(secrets::update_secret).delete(secrets::delete_secret),
        )
        .route("/projects/{id}/audit", get(audit::list_audit_logs))
        .route(
            "/projects/{id}/tokens",
            get(tokens::list_tokens).post(tokens::create_token),
        )
        .route(
            "/projects/{id}/tokens/{token_id}",
            patch(tokens::update_token).delete(tokens::delete_token),
        )
        .route("/projects/{id}/export", get(transfer::export_secrets))
        .route("/projects/{id}/import", post(transfer::import_secrets))
        .route("/projects/{id}/fork", post(fork::fork_config))
        .route(
            "/v1/secrets",
            get(v1::read_secrets).post(v1::write_secrets),
        );

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    Router::new()
        .nest("/api", project_routes)
        .merge(health_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Bearer crypt_<token>",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        projects::list_projects,
        projects::create_project,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::project_details,
        environments::create_environment,
        environments::delete_environment,
        secrets::create_secret,
        secrets::update_secret,
        secrets::delete_secret,
        secrets::clear_secrets,
        secrets::secret_history,
        secrets::rollback_secret,
        audit::list_audit_logs,
        tokens::list_tokens,
        tokens::create_token,
        tokens::update_token,
        tokens::delete_token,
        transfer::export_secrets,
        transfer::import_secrets,
        fork::fork_config,
        v1::read_secrets,
        v1::write_secrets
    ),
    components(
        schemas(
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse,
            MessageResponse,
            StoredProject,
            StoredEnvironment,
            StoredConfig,
            Secret,
            SecretType,
            AuditAction,
            AuditLog,
            ProjectRequest,
            ProjectDetails,
            EnvironmentDetails,
            ConfigDetails,
            CreateEnvironmentRequest,
            CreateEnvironmentResponse,
            CreateSecretRequest,
            UpdateSecretRequest,
            ClearSecretsRequest,
            RollbackRequest,
            RollbackResponse,
            AuditLogEntry,
            TokenSummary,
            CreateTokenRequest,
            CreateTokenResponse,
            UpdateTokenRequest,
            ImportResponse,
            ForkRequest,
            ForkResponse,
            SecretsDocument,
            WriteSecretsRequest,
            WriteSecretsResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Projects", description = "Project management"),
        (name = "Environments", description = "Environment management"),
        (name = "Secrets", description = "Secret editing, history and rollback"),
        (name = "Audit", description = "Project audit trail"),
        (name = "Tokens", description = "API token management"),
        (name = "Transfer", description = "Export, import and fork"),
        (name = "Programmatic API", description = "Token-authenticated secret access")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::extractor::tests::{session_jwt, test_state};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    pub(crate) fn request(
        method: Method,
        uri: &str,
        bearer_token: &str,
        body: Option<Value>,
    ) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {bearer_token}"));
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub(crate) async fn send_request(state: &AppState, request: Request<Body>) -> Response {
        router(state.clone()).oneshot(request).await.unwrap()
    }

    /// Sends a request as `user` with a signed session.
    pub(crate) async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        user: &str,
        body: Option<Value>,
    ) -> Response {
        send_request(state, request(method, uri, &session_jwt(user), body)).await
    }

    pub(crate) async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub(crate) async fn create_project(state: &AppState, user: &str) -> String {
        let response = send(
            state,
            Method::POST,
            "/api/projects",
            user,
            Some(json!({"name": "P1"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Id of the default config in the environment at `env_index` (0 = dev).
    pub(crate) async fn default_config(
        state: &AppState,
        project_id: &str,
        user: &str,
        env_index: usize,
    ) -> String {
        let details = body_json(
            send(
                state,
                Method::GET,
                &format!("/api/projects/{project_id}/details"),
                user,
                None,
            )
            .await,
        )
        .await;
        details["environments"][env_index]["secretConfigs"][0]["id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn required_rejects_blank_values() {
        assert_eq!(required(&None), None);
        assert_eq!(required(&Some("   ".to_string())), None);
        assert_eq!(required(&Some(" x ".to_string())), Some(" x "));
    }

    #[tokio::test]
    async fn health_is_public_and_tagged_with_request_id() {
        let (state, _dir) = test_state();
        let response = send_request(
            &state,
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn api_routes_require_a_session() {
        let (state, _dir) = test_state();
        let response = send_request(
            &state,
            Request::builder()
                .uri("/api/projects")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (state, _dir) = test_state();
        let response = send_request(
            &state,
            Request::builder()
                .uri("/api-doc/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = body_json(response).await;
        assert!(doc["paths"]["/api/v1/secrets"].is_object());
        assert!(doc["paths"]["/api/projects/{id}/secrets/rollback"].is_object());
        assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}

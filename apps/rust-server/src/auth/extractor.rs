// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session users and API tokens.
//!
//! Use `Auth` in interactive handlers and `TokenAuth` in programmatic ones:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//!
//! async fn my_v1_handler(TokenAuth(token): TokenAuth) -> impl IntoResponse {
//!     // token is TokenContext
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::claims::SessionClaims;
use super::tokens::{parse_bearer, TokenAuthority, TokenContext};
use super::{AuthError, AuthenticatedUser};
use crate::state::{AppState, AuthConfig};
use crate::storage::{StoreError, UserRepository};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Cookie carrying the session JWT when no Authorization header is sent.
pub const SESSION_COOKIE: &str = "crypt_session";

/// Extractor for authenticated session users.
///
/// The session JWT is read from `Authorization: Bearer <jwt>` or, failing
/// that, from the `crypt_session` cookie.
///
/// ## Verification Modes
///
/// - **SESSION_SECRET set**: HS256 signature and expiry are verified
/// - **`dev` feature, no secret**: decoded without signature verification
/// - **Neither**: every request fails with `auth_not_configured`
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // First check if a layer already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let token = session_token(parts)?;
        let user = verify_session(&token, &state.auth_config)?;
        remember_profile(state, &user);

        Ok(Auth(user))
    }
}

/// Locate the session token in the request.
fn session_token(parts: &Parts) -> Result<String, AuthError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let header = header.to_str().map_err(|_| AuthError::InvalidAuthHeader)?;
        return parse_bearer(header)
            .map(str::to_string)
            .ok_or(AuthError::InvalidAuthHeader);
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

/// Verify a session JWT and extract user information.
fn verify_session(token: &str, auth_config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    match &auth_config.session_secret {
        Some(secret) => verify_session_hs256(token, secret),
        None => verify_session_unconfigured(token),
    }
}

fn verify_session_hs256(token: &str, secret: &str) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken,
    })?;

    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

/// Development session decoding (no signature check).
///
/// WARNING: only compiled with the `dev` feature.
#[cfg(feature = "dev")]
fn verify_session_unconfigured(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<SessionClaims>(token)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims = token_data.claims;

    let now = chrono::Utc::now().timestamp();
    if claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

#[cfg(not(feature = "dev"))]
fn verify_session_unconfigured(_token: &str) -> Result<AuthenticatedUser, AuthError> {
    Err(AuthError::NotConfigured)
}

/// Store the session's email and name when they changed. Failures are
/// logged; they never reject the request.
fn remember_profile(state: &AppState, user: &AuthenticatedUser) {
    let email = user.email.as_deref();
    let name = user.name.as_deref();

    let result = state
        .store
        .read(|txn| UserRepository::new(txn).needs_update(&user.user_id, email, name))
        .and_then(|stale| {
            if stale {
                state.store.write(|txn| {
                    UserRepository::new(txn).upsert(&user.user_id, email, name)
                })
            } else {
                Ok::<_, StoreError>(())
            }
        });

    if let Err(e) = result {
        tracing::warn!(user_id = %user.user_id, error = %e, "Failed to store user profile");
    }
}

/// Extractor for API tokens of the programmatic API.
///
/// Any failure (missing header, unknown, inactive or expired token) is
/// reported as `401 Invalid or expired token`.
pub struct TokenAuth(pub TokenContext);

impl FromRequestParts<AppState> for TokenAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
            .ok_or(AuthError::InvalidApiToken)?;

        let context = state
            .store
            .write(|txn| TokenAuthority::new(txn).validate(token))
            .map_err(|e: StoreError| {
                tracing::error!(error = %e, "API token validation failed");
                AuthError::InternalError("token validation failed".to_string())
            })?;

        context.map(TokenAuth).ok_or(AuthError::InvalidApiToken)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tempfile::TempDir;

    pub(crate) const TEST_SECRET: &str = "test-session-secret";

    /// AppState over a temporary store, verifying sessions with TEST_SECRET.
    pub(crate) fn test_state() -> (AppState, TempDir) {
        let (store, dir) = temp_store();
        let state = AppState::new(store).with_auth_config(AuthConfig {
            session_secret: Some(TEST_SECRET.to_string()),
        });
        (state, dir)
    }

    /// HS256 session JWT for `user_id`.
    pub(crate) fn session_jwt(user_id: &str) -> String {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: chrono::Utc::now().timestamp(),
            email: Some(format!("{user_id}@example.com")),
            name: Some(format!("User {user_id}")),
            sid: Some("sess_123".to_string()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn parts_with(header: Option<(&str, String)>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_credentials() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_bearer_and_stores_profile() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {}", session_jwt("user_123")))));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_123");

        let profile = state
            .store
            .read(|txn| UserRepository::new(txn).find("user_123"))
            .unwrap()
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("user_123@example.com"));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_session_cookie() {
        let (state, _dir) = test_state();
        let cookie = format!("theme=dark; {SESSION_COOKIE}={}", session_jwt("user_cookie"));
        let mut parts = parts_with(Some(("Cookie", cookie)));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_cookie");
    }

    #[tokio::test]
    async fn auth_extractor_rejects_wrong_signature() {
        let (state, _dir) = test_state();
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &SessionClaims {
                sub: "mallory".to_string(),
                exp: chrono::Utc::now().timestamp() + 3600,
                iat: 0,
                email: None,
                name: None,
                sid: None,
            },
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {forged}"))));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(Some(("Authorization", "Basic abc".to_string())));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state();
        let mut parts = parts_with(None);
        parts.extensions.insert(AuthenticatedUser {
            user_id: "user_from_layer".to_string(),
            email: None,
            name: None,
            session_id: None,
            expires_at: 0,
        });

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_from_layer");
    }

    #[cfg(not(feature = "dev"))]
    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let (store, _dir) = temp_store();
        let state = AppState::new(store);
        let mut parts = parts_with(Some(("Authorization", format!("Bearer {}", session_jwt("u")))));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn token_auth_rejects_missing_and_unknown_tokens() {
        let (state, _dir) = test_state();

        let mut parts = parts_with(None);
        let result = TokenAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidApiToken)));

        let mut parts = parts_with(Some(("Authorization", "Bearer crypt_nope".to_string())));
        let result = TokenAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidApiToken)));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claims carried by a session JWT.
///
/// Sessions are issued by the external session provider and signed HS256.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Session ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// Authenticated user information extracted from a session.
///
/// This is the primary type used throughout the application to represent
/// the user making an interactive request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_copies_identity() {
        let user = AuthenticatedUser::from_claims(SessionClaims {
            sub: "user_123".to_string(),
            exp: 1700003600,
            iat: 1700000000,
            email: Some("ada@example.com".to_string()),
            name: None,
            sid: Some("sess_abc".to_string()),
        });
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.session_id.as_deref(), Some("sess_abc"));
        assert_eq!(user.expires_at, 1700003600);
    }

    #[test]
    fn optional_claims_default() {
        let claims: SessionClaims =
            serde_json::from_str(r#"{"sub":"u","exp":1}"#).unwrap();
        assert!(claims.email.is_none());
        assert!(claims.sid.is_none());
        assert_eq!(claims.iat, 0);
    }
}

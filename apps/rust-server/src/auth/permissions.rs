// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API token permissions.
//!
//! On the wire a permissions document is either `{"admin": true}` or
//! `{"environments": {"<name or *>": ["read", "write", "*"]}}`. Tokens are
//! not bound to an environment when issued; each request is checked against
//! the environment it names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Environment key matching every environment.
pub const WILDCARD: &str = "*";

/// An action a token may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TokenAction {
    #[serde(rename = "read")]
    Read,
    #[serde(rename = "write")]
    Write,
    /// Every action.
    #[serde(rename = "*")]
    All,
}

/// Parsed permissions of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PermissionsDocument", into = "PermissionsDocument")]
pub enum Permissions {
    /// Full access to every environment and action.
    Admin,
    /// Environment name (or `*`) to the actions allowed there.
    Scoped(BTreeMap<String, BTreeSet<TokenAction>>),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PermissionsDocument {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environments: Option<BTreeMap<String, BTreeSet<TokenAction>>>,
}

impl From<PermissionsDocument> for Permissions {
    fn from(doc: PermissionsDocument) -> Self {
        if doc.admin {
            Permissions::Admin
        } else {
            Permissions::Scoped(doc.environments.unwrap_or_default())
        }
    }
}

impl From<Permissions> for PermissionsDocument {
    fn from(permissions: Permissions) -> Self {
        match permissions {
            Permissions::Admin => PermissionsDocument {
                admin: true,
                environments: None,
            },
            Permissions::Scoped(environments) => PermissionsDocument {
                admin: false,
                environments: Some(environments),
            },
        }
    }
}

impl Permissions {
    /// Whether `action` is allowed on `environment`.
    ///
    /// Admin allows everything. Otherwise the environment's own entry and
    /// the `*` entry are consulted; either may grant the action itself or
    /// the `*` action.
    pub fn authorize(&self, action: TokenAction, environment: &str) -> bool {
        match self {
            Permissions::Admin => true,
            Permissions::Scoped(environments) => [environment, WILDCARD]
                .iter()
                .filter_map(|key| environments.get(*key))
                .any(|actions| actions.contains(&action) || actions.contains(&TokenAction::All)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Permissions {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn admin_allows_everything() {
        let permissions = parse(json!({"admin": true}));
        assert_eq!(permissions, Permissions::Admin);
        assert!(permissions.authorize(TokenAction::Write, "anything"));
    }

    #[test]
    fn scoped_environment_only() {
        let permissions = parse(json!({"environments": {"production": ["read"]}}));
        assert!(permissions.authorize(TokenAction::Read, "production"));
        assert!(!permissions.authorize(TokenAction::Write, "production"));
        assert!(!permissions.authorize(TokenAction::Read, "staging"));
    }

    #[test]
    fn wildcard_environment_and_action() {
        let permissions = parse(json!({"environments": {"*": ["read"], "development": ["*"]}}));
        assert!(permissions.authorize(TokenAction::Read, "staging"));
        assert!(!permissions.authorize(TokenAction::Write, "staging"));
        assert!(permissions.authorize(TokenAction::Write, "development"));
    }

    #[test]
    fn admin_false_falls_back_to_environments() {
        let permissions = parse(json!({"admin": false, "environments": {"dev": ["write"]}}));
        assert!(permissions.authorize(TokenAction::Write, "dev"));
        assert!(!permissions.authorize(TokenAction::Read, "dev"));
    }

    #[test]
    fn empty_document_grants_nothing() {
        let permissions = parse(json!({}));
        assert!(!permissions.authorize(TokenAction::Read, "dev"));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<Permissions, _> =
            serde_json::from_value(json!({"environments": {"dev": ["delete"]}}));
        assert!(result.is_err());
    }

    #[test]
    fn serializes_back_to_document_shape() {
        assert_eq!(serde_json::to_value(Permissions::Admin).unwrap(), json!({"admin": true}));

        let scoped = parse(json!({"environments": {"dev": ["write", "read"]}}));
        assert_eq!(
            serde_json::to_value(&scoped).unwrap(),
            json!({"environments": {"dev": ["read", "write"]}})
        );
    }
}

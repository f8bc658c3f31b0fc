// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the store.
//!
//! Each repository borrows one transaction. Read methods work on any
//! [`Reader`](super::Reader); mutations require a [`Writer`](super::Writer).

pub mod configs;
pub mod environments;
pub mod projects;
pub mod secrets;
pub mod tokens;
pub mod users;

pub use configs::{is_valid_config_name, ConfigRepository, StoredConfig};
pub use environments::{is_valid_shortcut, CascadeCounts, EnvironmentRepository, StoredEnvironment};
pub use projects::{ProjectPurge, ProjectRepository, StoredProject, DEFAULT_ENVIRONMENTS};
pub use secrets::{NewSecret, Secret, SecretRepository, SecretType, StoredSecret};
pub use tokens::{StoredToken, TokenRepository};
pub use users::{UserProfile, UserRepository};

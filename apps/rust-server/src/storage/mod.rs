// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! The entity store of record: a single redb file holding projects,
//! environments, configs, secrets, the audit ledger, API tokens and user
//! profiles.
//!
//! ## Hierarchy
//!
//! ```text
//! Project (owner user)
//!   Environment (shortcut unique per project)
//!     SecretConfig (name unique per environment)
//!       Secret (key unique per config)
//!   AuditLog (append-only)
//!   ApiToken (hash unique)
//! ```
//!
//! ## Guarantees
//!
//! - One transaction per request; multi-step mutations are all-or-nothing
//! - Unique indexes are the authority for every uniqueness rule
//! - Secret values and audit metadata are sealed with AES-256-GCM when a
//!   master key is configured

pub mod audit;
pub mod cipher;
pub mod database;
pub mod ownership;
pub mod repository;

pub use audit::{AuditAction, AuditEntry, AuditLedger, AuditLog, AuditMetadata};
pub use cipher::{SealedValue, Sealer, ValueCipher};
pub use database::{Reader, SecretStore, StoreError, StoreResult, Writer};
pub use ownership::{OwnedResource, OwnershipChain, OwnershipCheck, OwnershipEnforcer};
pub use repository::{
    ConfigRepository, EnvironmentRepository, NewSecret, ProjectRepository, Secret,
    SecretRepository, SecretType, StoredConfig, StoredEnvironment, StoredProject, StoredToken,
    TokenRepository, UserRepository,
};

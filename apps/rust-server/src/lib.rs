// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crypt - multi-tenant secrets and configuration manager
//!
//! Projects own environments, environments own named configs and configs
//! own typed secrets. Every mutation lands in an append-only audit ledger
//! that drives history and rollback.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum), interactive and token-based
//! - `auth` - Session JWTs, API tokens and permission checks
//! - `storage` - redb-backed entity store and audit ledger
//! - `vault` - Import, export, fork and rollback engines

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod state;
pub mod storage;
pub mod vault;

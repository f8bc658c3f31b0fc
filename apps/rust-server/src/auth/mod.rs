// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Two independent authorities guard the API:
//!
//! ## Interactive API (sessions)
//!
//! 1. The session provider signs a JWT (HS256, `SESSION_SECRET`)
//! 2. The client sends it as `Authorization: Bearer <jwt>` or in the
//!    `crypt_session` cookie
//! 3. The server verifies signature and expiry and extracts:
//!    - `sub` → canonical `user_id`
//!    - `email`, `name` → stored for audit display
//!
//! ## Programmatic API (tokens)
//!
//! 1. A project owner issues a `crypt_…` token with a permissions document
//! 2. The client sends `Authorization: Bearer crypt_…`
//! 3. The server hashes the token, looks it up, rejects inactive or
//!    expired tokens and checks the permission per request
//!
//! ## Security
//!
//! - Only token digests are stored
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod permissions;
pub mod tokens;

pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::{Auth, TokenAuth, SESSION_COOKIE};
pub use permissions::{Permissions, TokenAction};
pub use tokens::{TokenAuthority, TokenContext};

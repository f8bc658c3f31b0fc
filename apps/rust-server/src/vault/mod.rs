// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Multi-step operations over the entity store.
//!
//! Each engine runs inside the caller's write transaction, so a failure
//! anywhere leaves the store untouched.

pub mod fork;
pub mod formats;
pub mod import;
pub mod rollback;

pub use fork::{fork_config, ForkOutcome};
pub use formats::{ParsedEntry, TransferFormat};
pub use import::{import_into, ImportOutcome};
pub use rollback::{rollback, RollbackOutcome};

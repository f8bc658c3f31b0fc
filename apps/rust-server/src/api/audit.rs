// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::{
    auth::Auth,
    error::ApiError,
    models::{AuditLogEntry, AuditQuery},
    state::AppState,
    storage::{AuditLedger, OwnershipChain, UserRepository},
};

/// Ledger of a project, newest first, with each acting user's name and
/// email as last seen in a session.
#[utoipa::path(
    get,
    path = "/api/projects/{id}/audit",
    tag = "Audit",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Project ID"), AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = [AuditLogEntry]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Project not found")
    )
)]
pub async fn list_audit_logs(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, ApiError> {
    let limit = query.limit.unwrap_or(state.audit_default_limit);

    let entries = state.store.read(|txn| {
        let project = OwnershipChain::new(txn).project(&user, &project_id)?;
        let logs = AuditLedger::new(txn, state.store.sealer()).list_by_project(&project.id, limit)?;

        let users = UserRepository::new(txn);
        let mut profiles = HashMap::new();
        for log in &logs {
            if !profiles.contains_key(&log.user_id) {
                profiles.insert(log.user_id.clone(), users.find(&log.user_id)?);
            }
        }

        Ok::<_, ApiError>(
            logs.into_iter()
                .map(|log| {
                    let profile = profiles.get(&log.user_id).and_then(Option::as_ref);
                    AuditLogEntry::new(log, profile)
                })
                .collect::<Vec<_>>(),
        )
    })?;

    Ok(Json(entries))
}

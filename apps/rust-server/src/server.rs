// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process wiring: open the store, build the router and serve it until
//! the cancellation token fires.

use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;

use crate::{
    api::router,
    config::{AppConfig, ConfigError},
    state::{AppState, AuthConfig},
    storage::{Sealer, SecretStore, StoreError},
};

/// In-flight requests get this long to finish after shutdown starts.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Open the store described by `config` and build the shared state.
pub fn build_state(config: &AppConfig) -> Result<AppState, ServerError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let sealer = Sealer::new(config.value_cipher()?);
    if !sealer.is_encrypting() {
        tracing::warn!("SECRETS_MASTER_KEY is not set; secret values are stored unencrypted");
    }
    if config.session_secret.is_none() {
        tracing::warn!("SESSION_SECRET is not set; interactive sessions cannot be verified");
    }

    let store = SecretStore::open(&config.database_path(), sealer)?;
    tracing::info!(path = %config.database_path().display(), "Store opened");

    Ok(AppState::new(store)
        .with_auth_config(AuthConfig {
            session_secret: config.session_secret.clone(),
        })
        .with_audit_limit(config.audit_default_limit)
        .with_data_dir(config.data_dir.clone()))
}

/// Serve the API until `cancel` is triggered.
pub async fn run(config: AppConfig, cancel: CancellationToken) -> Result<(), ServerError> {
    let state = build_state(&config)?;
    let app = router(state);
    let addr = config.bind_addr;

    if let Some(tls) = &config.tls {
        // Errors only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
            .await
            .map_err(|e| ServerError::Tls(e.to_string()))?;

        tracing::info!(
            address = %addr,
            cert = %tls.cert.display(),
            "Listening on https (docs at /docs)"
        );

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(address = %addr, "Listening on http (docs at /docs)");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
    }

    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `crypt.redb` | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SESSION_SECRET` | HS256 key for session JWTs | Required for production |
//! | `SECRETS_MASTER_KEY` | Base64 32-byte AES-256-GCM key for values at rest | Optional (plain storage) |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; both set enables HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `AUDIT_DEFAULT_LIMIT` | Default page size of the audit listing | `100` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::state::DEFAULT_AUDIT_LIMIT;
use crate::storage::{StoreError, ValueCipher};

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";
pub const MASTER_KEY_ENV: &str = "SECRETS_MASTER_KEY";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const AUDIT_DEFAULT_LIMIT_ENV: &str = "AUDIT_DEFAULT_LIMIT";

/// File name of the store inside the data directory.
pub const DATABASE_FILE: &str = "crypt.redb";

const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{set} is set but {missing} is not")]
    IncompleteTls {
        set: &'static str,
        missing: &'static str,
    },

    #[error("invalid SECRETS_MASTER_KEY: {0}")]
    MasterKey(#[from] StoreError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub session_secret: Option<String>,
    pub master_key: Option<String>,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
    pub audit_default_limit: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("data_dir", &self.data_dir)
            .field("bind_addr", &self.bind_addr)
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<redacted>"))
            .field("master_key", &self.master_key.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("log_format", &self.log_format)
            .field("audit_default_limit", &self.audit_default_limit)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(port) => port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let master_key = var(MASTER_KEY_ENV);
        if let Some(key) = &master_key {
            ValueCipher::from_base64(key.trim())?;
        }

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTls {
                    set: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTls {
                    set: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
            (None, None) => None,
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("expected `json` or `pretty`, got `{other}`"),
                })
            }
        };

        let audit_default_limit = match var(AUDIT_DEFAULT_LIMIT_ENV) {
            Some(limit) => limit
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: AUDIT_DEFAULT_LIMIT_ENV,
                    reason: "expected a positive integer".to_string(),
                })?,
            None => DEFAULT_AUDIT_LIMIT,
        };

        Ok(Self {
            data_dir: PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            bind_addr,
            session_secret: var(SESSION_SECRET_ENV),
            master_key,
            tls,
            log_format,
            audit_default_limit,
        })
    }

    /// Path of the redb file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Cipher for values at rest, if a master key is configured.
    pub fn value_cipher(&self) -> Result<Option<ValueCipher>, ConfigError> {
        self.master_key
            .as_deref()
            .map(|key| ValueCipher::from_base64(key.trim()).map_err(ConfigError::from))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64, Encoding};
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.database_path(), PathBuf::from("./data/crypt.redb"));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.audit_default_limit, DEFAULT_AUDIT_LIMIT);
        assert!(config.session_secret.is_none());
        assert!(config.tls.is_none());
        assert!(config.value_cipher().unwrap().is_none());
    }

    #[test]
    fn reads_overrides() {
        let key = Base64::encode_string(&[7u8; 32]);
        let config = load(&[
            ("DATA_DIR", "/var/lib/crypt"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("SESSION_SECRET", "s3cret"),
            ("SECRETS_MASTER_KEY", key.as_str()),
            ("TLS_CERT_PATH", "/tls/cert.pem"),
            ("TLS_KEY_PATH", "/tls/key.pem"),
            ("LOG_FORMAT", "json"),
            ("AUDIT_DEFAULT_LIMIT", "25"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/crypt/crypt.redb"));
        assert_eq!(config.session_secret.as_deref(), Some("s3cret"));
        assert!(config.value_cipher().unwrap().is_some());
        assert_eq!(config.tls.unwrap().key, PathBuf::from("/tls/key.pem"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.audit_default_limit, 25);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(load(&[("PORT", "http")]), Err(ConfigError::Invalid { .. })));
        assert!(matches!(load(&[("LOG_FORMAT", "xml")]), Err(ConfigError::Invalid { .. })));
        assert!(matches!(
            load(&[("AUDIT_DEFAULT_LIMIT", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[("SECRETS_MASTER_KEY", "c2hvcnQ=")]),
            Err(ConfigError::MasterKey(_))
        ));
        assert!(matches!(
            load(&[("TLS_CERT_PATH", "/tls/cert.pem")]),
            Err(ConfigError::IncompleteTls { .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = load(&[("SESSION_SECRET", "s3cret")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`ServerConfig`] loaded at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for proofs, notes, folders, audit log | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `CHAIN` | `sepolia` or `local` (in-process contract) | `local` |
//! | `RPC_URL` | JSON-RPC endpoint | network default |
//! | `CONTRACT_ADDRESS` | Deployed ProofNest contract | Required unless `CHAIN=local` |
//! | `SIGNER_PRIVATE_KEY` | Relay signer key (hex) for server-side anchoring | Optional |
//! | `SIGNER_KEY_PATH` | Relay signer key file (PEM) | Optional |
//! | `AUTH_JWKS_URL` | JWKS endpoint for RS/ES token verification | Optional |
//! | `AUTH_JWT_SECRET` | Shared secret for HS256 tokens | Optional |
//! | `AUTH_ISSUER` | Expected `iss` claim | Optional |
//! | `AUTH_AUDIENCE` | Expected `aud` claim | Optional |
//! | `RECONCILE_INTERVAL_SECS` | Seconds between reconciliation sweeps | `15` |
//! | `RECEIPT_TIMEOUT_SECS` | Max wait for a payment receipt | `60` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | Optional |
//! | `PUBLIC_BASE_URL` | Origin of the share page, used in share links | Optional |

use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::{network_from_key, NetworkConfig};
use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const CHAIN_ENV: &str = "CHAIN";
pub const RPC_URL_ENV: &str = "RPC_URL";
pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";
pub const SIGNER_PRIVATE_KEY_ENV: &str = "SIGNER_PRIVATE_KEY";
pub const SIGNER_KEY_PATH_ENV: &str = "SIGNER_KEY_PATH";
pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_JWT_SECRET_ENV: &str = "AUTH_JWT_SECRET";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const RECONCILE_INTERVAL_ENV: &str = "RECONCILE_INTERVAL_SECS";
pub const RECEIPT_TIMEOUT_ENV: &str = "RECEIPT_TIMEOUT_SECS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const PUBLIC_BASE_URL_ENV: &str = "PUBLIC_BASE_URL";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CHAIN: &str = "local";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Everything the server reads from its environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub contract_address: Option<String>,
    pub signer_private_key: Option<String>,
    pub signer_key_path: Option<PathBuf>,
    pub jwks_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub reconcile_interval: Duration,
    pub receipt_timeout: Duration,
    /// Both set enables HTTPS.
    pub tls: Option<(PathBuf, PathBuf)>,
    pub public_base_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    reason: format!("`{other}` (expected `json` or `pretty`)"),
                })
            }
        };

        let network = network_from_key(&var(CHAIN_ENV).unwrap_or_else(|| DEFAULT_CHAIN.to_string()))
            .map_err(|reason| ConfigError::Invalid {
                name: CHAIN_ENV,
                reason,
            })?;

        let contract_address = var(CONTRACT_ADDRESS_ENV);
        if network.key != "local" && contract_address.is_none() {
            return Err(ConfigError::Missing(CONTRACT_ADDRESS_ENV));
        }

        let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            host: var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            data_dir: PathBuf::from(var(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string())),
            log_format,
            rpc_url: var(RPC_URL_ENV).unwrap_or_else(|| network.default_rpc_url.to_string()),
            network,
            contract_address,
            signer_private_key: var(SIGNER_PRIVATE_KEY_ENV),
            signer_key_path: var(SIGNER_KEY_PATH_ENV).map(PathBuf::from),
            jwks_url: var(AUTH_JWKS_URL_ENV),
            jwt_secret: var(AUTH_JWT_SECRET_ENV),
            issuer: var(AUTH_ISSUER_ENV),
            audience: var(AUTH_AUDIENCE_ENV),
            reconcile_interval: seconds(
                var(RECONCILE_INTERVAL_ENV),
                RECONCILE_INTERVAL_ENV,
                DEFAULT_RECONCILE_INTERVAL_SECS,
            )?,
            receipt_timeout: seconds(
                var(RECEIPT_TIMEOUT_ENV),
                RECEIPT_TIMEOUT_ENV,
                DEFAULT_RECEIPT_TIMEOUT_SECS,
            )?,
            tls,
            public_base_url: var(PUBLIC_BASE_URL_ENV).map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether bearer tokens are verified cryptographically.
    pub fn auth_verification_configured(&self) -> bool {
        self.jwks_url.is_some() || self.jwt_secret.is_some()
    }
}

fn seconds(raw: Option<String>, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs = match raw {
        Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })?,
        None => default,
    };
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_use_local_chain() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.network.key, "local");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.reconcile_interval, Duration::from_secs(15));
        assert_eq!(config.receipt_timeout, Duration::from_secs(60));
        assert!(config.tls.is_none());
        assert!(!config.auth_verification_configured());
    }

    #[test]
    fn sepolia_requires_contract_address() {
        assert_eq!(
            load(&[(CHAIN_ENV, "sepolia")]).unwrap_err(),
            ConfigError::Missing(CONTRACT_ADDRESS_ENV)
        );

        let config = load(&[
            (CHAIN_ENV, "sepolia"),
            (CONTRACT_ADDRESS_ENV, "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
        ])
        .unwrap();
        assert_eq!(config.network.chain_id, 11_155_111);
        assert_eq!(config.rpc_url, config.network.default_rpc_url);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[(PORT_ENV, "http")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            load(&[(RECONCILE_INTERVAL_ENV, "0")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            load(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(
            load(&[(TLS_CERT_PATH_ENV, "/tmp/cert.pem")]).unwrap_err(),
            ConfigError::Missing(TLS_KEY_PATH_ENV)
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = load(&[(AUTH_JWT_SECRET_ENV, "  "), (PUBLIC_BASE_URL_ENV, "https://proofnest.app/")]).unwrap();
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.public_base_url.as_deref(), Some("https://proofnest.app"));
    }
}

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
//! | `DCLOUD_NETWORK` | Cluster (`mainnet`, `devnet`, `testnet`, `localnet`) | `devnet` |
//! | `DCLOUD_RPC_URL` | JSON-RPC endpoint override | Network default |
//! | `DCLOUD_PROGRAM_ID` | Storage program id | `2DWNrUtJXqnA9qu444yyACg2VXnXmEqwBPG7Q7cgM1NM` |
//! | `DCLOUD_LEDGER` | Ledger backend (`rpc` or `memory`) | `rpc` |
//! | `DCLOUD_KEYPAIR_PATH` | JSON keypair file used to sign | Required for `rpc` |
//! | `DCLOUD_GATEWAY` | Content gateway (`pinata` or `memory`) | `pinata` |
//! | `PINATA_JWT` | Pinata bearer token | Required for `pinata` |
//! | `PINATA_API_URL` | Pinata API base | `https://api.pinata.cloud` |
//! | `PINATA_GATEWAY_URL` | Retrieval gateway | `https://gateway.pinata.cloud` |
//! | `DCLOUD_MAX_FILE_SIZE` | Upload limit in bytes | `104857600` |
//! | `DCLOUD_REQUEST_TIMEOUT_SECS` | Bound on every remote call | `30` |
//! | `HOST` | Bridge bind address | `127.0.0.1` |
//! | `PORT` | Bridge bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,dcloud_storage=debug,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::blockchain::{NetworkConfig, Pubkey, DEFAULT_PROGRAM_ID, SOLANA_DEVNET};
use crate::gateway::pinata::{DEFAULT_API_URL, DEFAULT_GATEWAY_URL};
use crate::session::{SessionConfig, UploadLimits, DEFAULT_MAX_FILE_SIZE};

pub const NETWORK_ENV: &str = "DCLOUD_NETWORK";
pub const RPC_URL_ENV: &str = "DCLOUD_RPC_URL";
pub const PROGRAM_ID_ENV: &str = "DCLOUD_PROGRAM_ID";
pub const LEDGER_ENV: &str = "DCLOUD_LEDGER";
pub const KEYPAIR_PATH_ENV: &str = "DCLOUD_KEYPAIR_PATH";
pub const GATEWAY_ENV: &str = "DCLOUD_GATEWAY";
pub const PINATA_JWT_ENV: &str = "PINATA_JWT";
pub const PINATA_API_URL_ENV: &str = "PINATA_API_URL";
pub const PINATA_GATEWAY_URL_ENV: &str = "PINATA_GATEWAY_URL";
pub const MAX_FILE_SIZE_ENV: &str = "DCLOUD_MAX_FILE_SIZE";
pub const REQUEST_TIMEOUT_ENV: &str = "DCLOUD_REQUEST_TIMEOUT_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,dcloud_storage=debug,tower_http=debug";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Which ledger the session talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBackend {
    /// JSON-RPC node, signing with a local keypair file
    Rpc { keypair_path: PathBuf },
    /// In-process ledger
    Memory,
}

/// Which content gateway pins uploads.
#[derive(Clone, PartialEq, Eq)]
pub enum GatewayBackend {
    Pinata {
        jwt: String,
        api_url: Url,
        gateway_url: Url,
    },
    Memory {
        gateway_url: Url,
    },
}

impl std::fmt::Debug for GatewayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayBackend::Pinata {
                api_url,
                gateway_url,
                ..
            } => f
                .debug_struct("Pinata")
                .field("jwt", &"[REDACTED]")
                .field("api_url", &api_url.as_str())
                .field("gateway_url", &gateway_url.as_str())
                .finish(),
            GatewayBackend::Memory { gateway_url } => f
                .debug_struct("Memory")
                .field("gateway_url", &gateway_url.as_str())
                .finish(),
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub program_id: Pubkey,
    pub ledger: LedgerBackend,
    pub gateway: GatewayBackend,
    pub session: SessionConfig,
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` (variable name to value).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let network = match get(NETWORK_ENV) {
            Some(name) => NetworkConfig::from_name(&name).ok_or(ConfigError::Invalid {
                var: NETWORK_ENV,
                reason: format!("unknown network {name:?}"),
            })?,
            None => SOLANA_DEVNET,
        };

        let rpc_url = match get(RPC_URL_ENV) {
            Some(raw) => parse_url(RPC_URL_ENV, &raw)?.to_string(),
            None => network.rpc_url.to_string(),
        };

        let program_id = get(PROGRAM_ID_ENV)
            .unwrap_or_else(|| DEFAULT_PROGRAM_ID.to_string())
            .parse::<Pubkey>()
            .map_err(|e| ConfigError::Invalid {
                var: PROGRAM_ID_ENV,
                reason: e.to_string(),
            })?;

        let ledger = match get(LEDGER_ENV).as_deref().unwrap_or("rpc") {
            "rpc" => LedgerBackend::Rpc {
                keypair_path: get(KEYPAIR_PATH_ENV)
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing(KEYPAIR_PATH_ENV))?,
            },
            "memory" => LedgerBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    var: LEDGER_ENV,
                    reason: format!("expected rpc or memory, got {other:?}"),
                })
            }
        };

        let gateway_url = parse_url(
            PINATA_GATEWAY_URL_ENV,
            &get(PINATA_GATEWAY_URL_ENV).unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
        )?;
        let gateway = match get(GATEWAY_ENV).as_deref().unwrap_or("pinata") {
            "pinata" => GatewayBackend::Pinata {
                jwt: get(PINATA_JWT_ENV).ok_or(ConfigError::Missing(PINATA_JWT_ENV))?,
                api_url: parse_url(
                    PINATA_API_URL_ENV,
                    &get(PINATA_API_URL_ENV).unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                )?,
                gateway_url,
            },
            "memory" => GatewayBackend::Memory { gateway_url },
            other => {
                return Err(ConfigError::Invalid {
                    var: GATEWAY_ENV,
                    reason: format!("expected pinata or memory, got {other:?}"),
                })
            }
        };

        let max_file_size = parse_number(MAX_FILE_SIZE_ENV, get(MAX_FILE_SIZE_ENV), DEFAULT_MAX_FILE_SIZE)?;
        if max_file_size == 0 {
            return Err(ConfigError::Invalid {
                var: MAX_FILE_SIZE_ENV,
                reason: "must be positive".to_string(),
            });
        }
        let timeout_secs = parse_number(REQUEST_TIMEOUT_ENV, get(REQUEST_TIMEOUT_ENV), DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: REQUEST_TIMEOUT_ENV,
                reason: "must be positive".to_string(),
            });
        }

        let session = SessionConfig {
            limits: UploadLimits {
                max_file_size,
                ..UploadLimits::default()
            },
            request_timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            network,
            rpc_url,
            program_id,
            ledger,
            gateway,
            session,
            host: get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_number(PORT_ENV, get(PORT_ENV), DEFAULT_PORT)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}

fn parse_number<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn memory_backends_need_no_credentials() {
        let config = load(&[(LEDGER_ENV, "memory"), (GATEWAY_ENV, "memory")]).unwrap();
        assert_eq!(config.ledger, LedgerBackend::Memory);
        assert_eq!(config.network.cluster, "devnet");
        assert_eq!(config.rpc_url, SOLANA_DEVNET.rpc_url);
        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(config.session.limits.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.session.request_timeout, Duration::from_secs(30));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn rpc_ledger_requires_keypair() {
        let err = load(&[(GATEWAY_ENV, "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(KEYPAIR_PATH_ENV)));
    }

    #[test]
    fn pinata_requires_jwt() {
        let err = load(&[(LEDGER_ENV, "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PINATA_JWT_ENV)));
    }

    #[test]
    fn full_rpc_configuration() {
        let config = load(&[
            (NETWORK_ENV, "localnet"),
            (KEYPAIR_PATH_ENV, "/tmp/id.json"),
            (PINATA_JWT_ENV, "secret-jwt"),
            (MAX_FILE_SIZE_ENV, "1024"),
            (REQUEST_TIMEOUT_ENV, "5"),
            (PORT_ENV, "9000"),
        ])
        .unwrap();
        assert_eq!(config.rpc_url, "http://localhost:8899");
        assert_eq!(
            config.ledger,
            LedgerBackend::Rpc {
                keypair_path: PathBuf::from("/tmp/id.json")
            }
        );
        assert_eq!(config.session.limits.max_file_size, 1024);
        assert_eq!(config.session.request_timeout, Duration::from_secs(5));
        assert_eq!(config.port, 9000);
        assert!(!format!("{config:?}").contains("secret-jwt"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let base = [(LEDGER_ENV, "memory"), (GATEWAY_ENV, "memory")];
        let cases: [(&str, &str); 5] = [
            (NETWORK_ENV, "moonnet"),
            (PROGRAM_ID_ENV, "not-base58!"),
            (MAX_FILE_SIZE_ENV, "0"),
            (REQUEST_TIMEOUT_ENV, "soon"),
            (PORT_ENV, "99999"),
        ];
        for (var, value) in cases {
            let mut vars = base.to_vec();
            vars.push((var, value));
            assert!(
                matches!(load(&vars), Err(ConfigError::Invalid { .. })),
                "{var}={value} should be rejected"
            );
        }
    }

    #[test]
    fn rpc_url_override_is_validated() {
        let base = [(LEDGER_ENV, "memory"), (GATEWAY_ENV, "memory")];
        let mut vars = base.to_vec();
        vars.push((RPC_URL_ENV, "http://127.0.0.1:8899"));
        assert_eq!(load(&vars).unwrap().rpc_url, "http://127.0.0.1:8899/");

        let mut bad = base.to_vec();
        bad.push((RPC_URL_ENV, "::nope"));
        assert!(matches!(load(&bad), Err(ConfigError::Invalid { .. })));
    }
}

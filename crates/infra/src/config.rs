//! Process configuration loaded from `AUTH_SERVICE_*` environment variables.
//!
//! Empty values count as unset. In `DEV` the listen port, timeout and
//! repository type fall back to defaults; in `PROD` they must be given.
//! Signing material is resolved here as well so that a service that could not
//! issue verifiable tokens never starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use warden_auth::SigningConfig;

pub const LIFECYCLE_KEY: &str = "AUTH_SERVICE_ENVIRONMENT";
pub const REPO_TYPE_KEY: &str = "AUTH_SERVICE_REPO_TYPE";
pub const TIMEOUT_KEY: &str = "AUTH_SERVICE_TIMEOUT";
pub const PORT_KEY: &str = "AUTH_SERVICE_PORT";
pub const PG_URL_KEY: &str = "AUTH_SERVICE_PG_URL";
pub const INIT_DATASET_KEY: &str = "AUTH_SERVICE_INIT_DATASET";
pub const TOKEN_SECRET_KEY: &str = "AUTH_SERVICE_TOKEN_SECRET";
pub const TOKEN_PRIVATE_KEY_KEY: &str = "AUTH_SERVICE_TOKEN_PRIV";
pub const TOKEN_PUBLIC_KEY_KEY: &str = "AUTH_SERVICE_TOKEN_PUB";

const DEV_PORT: u16 = 3333;
const DEV_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required")]
    Missing { key: &'static str },

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unable to read {key} file {path}: {reason}")]
    KeyFile {
        key: &'static str,
        path: String,
        reason: String,
    },

    #[error("token signing: {0}")]
    Signing(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifeCycle {
    Dev,
    Prod,
}

/// Which credential store backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoType {
    InMemory,
    Postgres { url: String },
}

impl RepoType {
    /// Name safe to log; never includes the connection string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::InMemory => "IN_MEMORY",
            RepoType::Postgres { .. } => "POSTGRESQL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub lifecycle: LifeCycle,
    pub repo_type: RepoType,
    /// Per-request deadline for the store and signing stages.
    pub timeout: Duration,
    pub port: u16,
    pub init_dataset: Option<PathBuf>,
    pub signing: SigningConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map instead of the environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let lifecycle = match get(LIFECYCLE_KEY).as_deref() {
            None | Some("DEV") => LifeCycle::Dev,
            Some("PROD") => LifeCycle::Prod,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: LIFECYCLE_KEY,
                    value: other.to_string(),
                    reason: "expected DEV or PROD",
                });
            }
        };
        let dev = lifecycle == LifeCycle::Dev;

        let repo_type = match get(REPO_TYPE_KEY).as_deref() {
            Some("IN_MEMORY") => RepoType::InMemory,
            Some("POSTGRESQL") => {
                let url = get(PG_URL_KEY).ok_or(ConfigError::Missing { key: PG_URL_KEY })?;
                RepoType::Postgres { url }
            }
            None if dev => RepoType::InMemory,
            None => return Err(ConfigError::Missing { key: REPO_TYPE_KEY }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: REPO_TYPE_KEY,
                    value: other.to_string(),
                    reason: "expected IN_MEMORY or POSTGRESQL",
                });
            }
        };

        let timeout_secs: u64 = match get(TIMEOUT_KEY) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: TIMEOUT_KEY,
                        value: raw,
                        reason: "expected a positive number of seconds",
                    });
                }
            },
            None if dev => DEV_TIMEOUT_SECS,
            None => return Err(ConfigError::Missing { key: TIMEOUT_KEY }),
        };

        let port: u16 = match get(PORT_KEY) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: PORT_KEY,
                        value: raw,
                        reason: "expected a port number",
                    });
                }
            },
            None if dev => DEV_PORT,
            None => return Err(ConfigError::Missing { key: PORT_KEY }),
        };

        let init_dataset = get(INIT_DATASET_KEY).map(PathBuf::from);

        let secret = get(TOKEN_SECRET_KEY);
        let private_pem = get(TOKEN_PRIVATE_KEY_KEY)
            .map(|path| read_key_file(TOKEN_PRIVATE_KEY_KEY, Path::new(&path)))
            .transpose()?;
        let public_pem = get(TOKEN_PUBLIC_KEY_KEY)
            .map(|path| read_key_file(TOKEN_PUBLIC_KEY_KEY, Path::new(&path)))
            .transpose()?;

        let signing = SigningConfig::select(
            secret.as_deref().map(str::as_bytes),
            private_pem.as_deref(),
            public_pem.as_deref(),
        )
        .map_err(|e| ConfigError::Signing(e.to_string()))?;

        Ok(Self {
            lifecycle,
            repo_type,
            timeout: Duration::from_secs(timeout_secs),
            port,
            init_dataset,
            signing,
        })
    }
}

fn read_key_file(key: &'static str, path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|e| ConfigError::KeyFile {
        key,
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

//! Runtime configuration from the environment

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_RETENTION_HOURS: u32 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid HELPER_PORT: {0}")]
    InvalidPort(String),
    #[error("Invalid HELPER_CONTEXT_BACKEND: {0} (expected `request` or `sqlite`)")]
    InvalidBackend(String),
    #[error("Invalid HELPER_CONTEXT_RETENTION_HOURS: {0} (expected a positive number of hours)")]
    InvalidRetention(String),
}

/// Where session contexts live between turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextBackend {
    /// Contexts round-trip through the webhook request and response
    #[default]
    Request,
    /// Contexts are kept in a local SQLite database keyed by session
    Sqlite,
}

impl FromStr for ContextBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(ContextBackend::Request),
            "sqlite" => Ok(ContextBackend::Sqlite),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

/// Configuration for the fulfillment server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentConfig {
    pub port: u16,
    /// Directory overriding the bundled response catalogs
    pub responses_dir: Option<PathBuf>,
    pub context_backend: ContextBackend,
    /// SQLite path, used by the `sqlite` backend
    pub db_path: PathBuf,
    /// Idle time after which a session's stored contexts are pruned
    pub context_retention_hours: u32,
}

impl FulfillmentConfig {
    /// # Errors
    ///
    /// Fails on an unparseable port, unknown backend name or invalid
    /// retention.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Fails on an unparseable port, unknown backend name or invalid
    /// retention.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("HELPER_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };

        let context_backend = lookup("HELPER_CONTEXT_BACKEND")
            .map(|backend| backend.parse())
            .transpose()?
            .unwrap_or_default();

        let db_path = lookup("HELPER_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".helper-fulfillment/sessions.db")
            },
            PathBuf::from,
        );

        let context_retention_hours = match lookup("HELPER_CONTEXT_RETENTION_HOURS") {
            Some(hours) => hours
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::InvalidRetention(hours))?,
            None => DEFAULT_RETENTION_HOURS,
        };

        Ok(Self {
            port,
            responses_dir: lookup("HELPER_RESPONSES_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
            context_backend,
            db_path,
            context_retention_hours,
        })
    }
}

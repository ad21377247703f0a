//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how the core logs.
//! - Load settings from JSON documents or `JOBBOARD_*` environment variables.
//!
//! # Invariants
//! - Every field has a default, so a partial document is valid.
//! - Numeric environment overrides that fail to parse are rejected, never ignored.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_FILE_NAME: &str = "jobboard.sqlite3";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PASSWORD_HISTORY_DEPTH: u32 = 5;
pub const DEFAULT_MAX_FAILED_LOGINS: u32 = 5;
pub const DEFAULT_FAILED_LOGIN_WINDOW_MS: i64 = 15 * 60 * 1000;

const ENV_DB_PATH: &str = "JOBBOARD_DB_PATH";
const ENV_LOG_LEVEL: &str = "JOBBOARD_LOG_LEVEL";
const ENV_LOG_DIR: &str = "JOBBOARD_LOG_DIR";
const ENV_BUSY_TIMEOUT_MS: &str = "JOBBOARD_BUSY_TIMEOUT_MS";
const ENV_PASSWORD_HISTORY_DEPTH: &str = "JOBBOARD_PASSWORD_HISTORY_DEPTH";
const ENV_MAX_FAILED_LOGINS: &str = "JOBBOARD_MAX_FAILED_LOGINS";

/// Errors produced while loading [`CoreConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    Json(serde_json::Error),
    /// Environment variable holds a value of the wrong shape.
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Settings shared by the storage bootstrap, logging and account services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// How many previous password hashes a user may not reuse.
    pub password_history_depth: u32,
    /// Failed attempts inside the failure window that lock an account.
    pub max_failed_logins: u32,
    pub failed_login_window_ms: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            password_history_depth: DEFAULT_PASSWORD_HISTORY_DEPTH,
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
            failed_login_window_ms: DEFAULT_FAILED_LOGIN_WINDOW_MS,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing keys fall back to defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Builds a config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (environment-style names).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = non_blank(lookup(ENV_DB_PATH)) {
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.log_level = value;
        }
        if let Some(value) = non_blank(lookup(ENV_LOG_DIR)) {
            config.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms = parse_number(ENV_BUSY_TIMEOUT_MS, value)?;
        }
        if let Some(value) = non_blank(lookup(ENV_PASSWORD_HISTORY_DEPTH)) {
            config.password_history_depth = parse_number(ENV_PASSWORD_HISTORY_DEPTH, value)?;
        }
        if let Some(value) = non_blank(lookup(ENV_MAX_FAILED_LOGINS)) {
            config.max_failed_logins = parse_number(ENV_MAX_FAILED_LOGINS, value)?;
        }

        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_BUSY_TIMEOUT_MS};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CoreConfig::from_json_str(r#"{"db_path": "/tmp/board.db"}"#).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("JOBBOARD_DB_PATH", "/var/lib/board.db"),
            ("JOBBOARD_LOG_DIR", "/var/log/board"),
            ("JOBBOARD_PASSWORD_HISTORY_DEPTH", "3"),
            ("JOBBOARD_LOG_LEVEL", "  "),
        ]
        .into_iter()
        .collect();

        let config =
            CoreConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string())).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/board.db"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/board")));
        assert_eq!(config.password_history_depth, 3);
        assert_eq!(config.log_level, CoreConfig::default().log_level);
    }

    #[test]
    fn lookup_rejects_malformed_numbers() {
        let err = CoreConfig::from_lookup(|key| {
            (key == "JOBBOARD_BUSY_TIMEOUT_MS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "JOBBOARD_BUSY_TIMEOUT_MS",
                ..
            }
        ));
    }
}

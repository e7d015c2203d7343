//! Process configuration read from the environment.

use std::env;
use std::num::ParseIntError;

use thiserror::Error;

use novus_observability::LogFormat;

use crate::store::sqlite::is_in_memory;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://novus.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("NOVUS_DATABASE_URL must be a sqlite URL, got '{0}'")]
    InvalidDatabaseUrl(String),
    #[error("invalid NOVUS_DB_MAX_CONNECTIONS: {0}")]
    InvalidMaxConnections(#[from] ParseIntError),
    #[error("NOVUS_DB_MAX_CONNECTIONS must be at least 1")]
    ZeroConnections,
    #[error("invalid NOVUS_LOG_FORMAT '{0}' (expected json or pretty)")]
    InvalidLogFormat(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub log_format: LogFormat,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_format: LogFormat::Json,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (the environment, or a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("NOVUS_DATABASE_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if !database_url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidDatabaseUrl(database_url));
        }

        let log_format = match lookup("NOVUS_LOG_FORMAT") {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|_| ConfigError::InvalidLogFormat(raw))?,
            None => LogFormat::Json,
        };

        let mut max_connections = match lookup("NOVUS_DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>()?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }
        // Every connection to :memory: would see its own empty database.
        if is_in_memory(&database_url) {
            max_connections = 1;
        }

        Ok(Self {
            database_url,
            log_format,
            max_connections,
        })
    }

    /// Point at another database, keeping the in-memory connection rule.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        if is_in_memory(&self.database_url) {
            self.max_connections = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn memory_databases_use_one_connection() {
        let cfg = config(&[
            ("NOVUS_DATABASE_URL", "sqlite::memory:"),
            ("NOVUS_DB_MAX_CONNECTIONS", "8"),
        ])
        .unwrap();
        assert_eq!(cfg.max_connections, 1);
    }

    #[test]
    fn overriding_the_url_keeps_the_memory_rule() {
        let cfg = AppConfig::default().with_database_url("sqlite::memory:");
        assert_eq!(cfg.max_connections, 1);
        assert_eq!(cfg.database_url, "sqlite::memory:");
    }

    #[test]
    fn pretty_logs_can_be_selected() {
        let cfg = config(&[("NOVUS_LOG_FORMAT", "Pretty")]).unwrap();
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            config(&[("NOVUS_DATABASE_URL", "postgres://db")]),
            Err(ConfigError::InvalidDatabaseUrl(_))
        ));
        assert!(matches!(
            config(&[("NOVUS_DB_MAX_CONNECTIONS", "many")]),
            Err(ConfigError::InvalidMaxConnections(_))
        ));
        assert!(matches!(
            config(&[("NOVUS_DB_MAX_CONNECTIONS", "0")]),
            Err(ConfigError::ZeroConnections)
        ));
        assert!(matches!(
            config(&[("NOVUS_LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }
}

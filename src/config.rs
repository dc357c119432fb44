//! Configuration types for quarry.toml

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use quarry_core::{GlobalOmit, IsolationLevel, TransactionOptions};
use serde::Deserialize;

/// Transaction defaults applied when a call does not pass its own options.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TransactionConfig {
    /// Time allowed to acquire a transaction, in milliseconds
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Maximum transaction lifetime, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub isolation_level: Option<IsolationLevel>,
}

fn default_max_wait_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            timeout_ms: default_timeout_ms(),
            isolation_level: None,
        }
    }
}

impl TransactionConfig {
    pub fn options(&self) -> TransactionOptions {
        TransactionOptions {
            max_wait: Duration::from_millis(self.max_wait_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            isolation_level: self.isolation_level,
        }
    }
}

/// Main configuration struct for quarry.toml
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub transaction: TransactionConfig,
    /// Fields hidden from every payload, per entity
    #[serde(default)]
    pub omit: BTreeMap<String, Vec<String>>,
    /// Emit a trace event for every statement
    #[serde(default)]
    pub log_queries: bool,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub(crate) fn global_omit(&self) -> GlobalOmit {
        let mut omit = GlobalOmit::new();
        for (entity, fields) in &self.omit {
            omit.insert(entity.clone(), fields.iter().cloned());
        }
        omit
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.transaction.options(), TransactionOptions::default());
    }

    #[test]
    fn parses_transaction_and_omit_tables() {
        let config = ClientConfig::parse(
            r#"
            log_queries = true

            [transaction]
            max_wait_ms = 250
            isolation_level = "serializable"

            [omit]
            User = ["password"]
            "#,
        )
        .unwrap();
        assert!(config.log_queries);
        let options = config.transaction.options();
        assert_eq!(options.max_wait, Duration::from_millis(250));
        assert_eq!(options.timeout, Duration::from_millis(5_000));
        assert_eq!(options.isolation_level, Some(IsolationLevel::Serializable));
        assert!(config.global_omit().is_omitted("User", "password"));
    }

    #[test]
    fn rejects_unknown_isolation_level() {
        let err = ClientConfig::parse("[transaction]\nisolation_level = \"snapshot\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ClientConfig::from_file(Path::new("/nonexistent/quarry.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}

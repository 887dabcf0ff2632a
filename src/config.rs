//! Timeouts and retry bounds of the protocol engine.

use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;

/// Default value for `message_timeout_ms` in [`ProtocolConfig`].
const DEFAULT_MESSAGE_TIMEOUT_MS: u64 = 20_000;

/// Default value for `restore_timeout_ms` in [`ProtocolConfig`].
const DEFAULT_RESTORE_TIMEOUT_MS: u64 = 30_000;

/// Default value for `max_sync_retries` in [`ProtocolConfig`].
const DEFAULT_MAX_SYNC_RETRIES: u32 = 2;

/// Default value for `max_messaging_retries` in [`ProtocolConfig`].
const DEFAULT_MAX_MESSAGING_RETRIES: u32 = 1;

/// Default value for `max_busy_retries` in [`ProtocolConfig`].
const DEFAULT_MAX_BUSY_RETRIES: u32 = 10;

/// Default value for `busy_backoff_ms` in [`ProtocolConfig`].
const DEFAULT_BUSY_BACKOFF_MS: u64 = 25;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn reason(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "ConfigIo",
            ConfigError::Parse(_) => "ConfigParse",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long to wait for the counterparty to answer a proposed update.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,

    /// How long to wait for the counterparty to answer a restore request.
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,

    /// How often a proposal is retried after syncing a newer counterparty
    /// update, before giving up with `SyncRequired`.
    #[serde(default = "default_max_sync_retries")]
    pub max_sync_retries: u32,

    /// How often a proposal is resent after a messaging timeout.
    #[serde(default = "default_max_messaging_retries")]
    pub max_messaging_retries: u32,

    /// How often a proposal is resent while the counterparty is busy with the
    /// same channel.
    #[serde(default = "default_max_busy_retries")]
    pub max_busy_retries: u32,

    /// Pause before resending to a busy counterparty.
    #[serde(default = "default_busy_backoff_ms")]
    pub busy_backoff_ms: u64,
}

fn default_message_timeout_ms() -> u64 {
    DEFAULT_MESSAGE_TIMEOUT_MS
}

fn default_restore_timeout_ms() -> u64 {
    DEFAULT_RESTORE_TIMEOUT_MS
}

fn default_max_sync_retries() -> u32 {
    DEFAULT_MAX_SYNC_RETRIES
}

fn default_max_messaging_retries() -> u32 {
    DEFAULT_MAX_MESSAGING_RETRIES
}

fn default_max_busy_retries() -> u32 {
    DEFAULT_MAX_BUSY_RETRIES
}

fn default_busy_backoff_ms() -> u64 {
    DEFAULT_BUSY_BACKOFF_MS
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            message_timeout_ms: DEFAULT_MESSAGE_TIMEOUT_MS,
            restore_timeout_ms: DEFAULT_RESTORE_TIMEOUT_MS,
            max_sync_retries: DEFAULT_MAX_SYNC_RETRIES,
            max_messaging_retries: DEFAULT_MAX_MESSAGING_RETRIES,
            max_busy_retries: DEFAULT_MAX_BUSY_RETRIES,
            busy_backoff_ms: DEFAULT_BUSY_BACKOFF_MS,
        }
    }
}

impl ProtocolConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ProtocolConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProtocolConfig::default());
        assert_eq!(config.message_timeout(), Duration::from_secs(20));
        assert_eq!(config.restore_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_sync_retries, 2);
        assert_eq!(config.max_messaging_retries, 1);
    }

    #[test]
    fn partial_config() {
        let config = ProtocolConfig::from_toml_str(
            r#"
            message_timeout_ms = 500
            max_sync_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.message_timeout_ms, 500);
        assert_eq!(config.max_sync_retries, 1);
        assert_eq!(config.restore_timeout_ms, DEFAULT_RESTORE_TIMEOUT_MS);
    }

    #[test]
    fn invalid_config() {
        let err = ProtocolConfig::from_toml_str("message_timeout_ms = \"soon\"").unwrap_err();
        assert_eq!(err.reason(), "ConfigParse");
    }

    #[test]
    fn load_missing_file() {
        let err = ProtocolConfig::load("/nonexistent/statechannel.toml").unwrap_err();
        assert_eq!(err.reason(), "ConfigIo");
    }
}

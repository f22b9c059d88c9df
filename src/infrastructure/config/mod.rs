//! Configuration loading for the custody ledger
//!
//! Supports JSON configuration files for memo format, confirmation
//! thresholds, fees, polling cadence and simulated settlement latency.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::application::use_cases::{SettlementTiming, WatcherConfig};

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {error}")]
    Io { path: String, error: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Root configuration for the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Fixed prefix of the deposit verification memo
    #[serde(default = "default_memo_prefix")]
    pub memo_prefix: String,

    /// Confirmations required before a deposit is credited
    #[serde(default = "default_required_confirmations")]
    pub required_confirmations: u32,

    /// Flat fee deducted from every withdrawal
    #[serde(default = "default_withdrawal_fee")]
    pub withdrawal_fee: Decimal,

    /// Polling cadence of the fallback ingestion channel, in seconds
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,

    /// History page size per poll
    #[serde(default = "default_poll_history_limit")]
    pub poll_history_limit: usize,

    /// Grace window for a freshly connected push stream, in seconds
    #[serde(default = "default_push_grace_secs")]
    pub push_grace_secs: u64,

    /// Simulated settlement: delay before processing, in milliseconds
    #[serde(default = "default_processing_delay_ms")]
    pub processing_delay_ms: u64,

    /// Simulated settlement: delay before confirmation, in milliseconds
    #[serde(default = "default_confirmation_delay_ms")]
    pub confirmation_delay_ms: u64,
}

fn default_memo_prefix() -> String {
    "CLDG".to_string()
}

fn default_required_confirmations() -> u32 {
    6
}

fn default_withdrawal_fee() -> Decimal {
    dec!(0.001)
}

fn default_polling_interval_secs() -> u64 {
    60
}

fn default_poll_history_limit() -> usize {
    50
}

fn default_push_grace_secs() -> u64 {
    30
}

fn default_processing_delay_ms() -> u64 {
    2_000
}

fn default_confirmation_delay_ms() -> u64 {
    5_000
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            memo_prefix: default_memo_prefix(),
            required_confirmations: default_required_confirmations(),
            withdrawal_fee: default_withdrawal_fee(),
            polling_interval_secs: default_polling_interval_secs(),
            poll_history_limit: default_poll_history_limit(),
            push_grace_secs: default_push_grace_secs(),
            processing_delay_ms: default_processing_delay_ms(),
            confirmation_delay_ms: default_confirmation_delay_ms(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            polling_interval: Duration::from_secs(self.polling_interval_secs),
            poll_history_limit: self.poll_history_limit,
            push_grace: Duration::from_secs(self.push_grace_secs),
        }
    }

    pub fn settlement_timing(&self) -> SettlementTiming {
        SettlementTiming {
            processing_delay: Duration::from_millis(self.processing_delay_ms),
            confirmation_delay: Duration::from_millis(self.confirmation_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.memo_prefix, "CLDG");
        assert_eq!(config.required_confirmations, 6);
        assert_eq!(config.withdrawal_fee, dec!(0.001));
        assert_eq!(config.polling_interval_secs, 60);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            LedgerConfig::from_json(r#"{"memo_prefix": "DEP", "required_confirmations": 3}"#)
                .unwrap();
        assert_eq!(config.memo_prefix, "DEP");
        assert_eq!(config.required_confirmations, 3);
        assert_eq!(config.withdrawal_fee, dec!(0.001));
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        assert!(matches!(
            LedgerConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}

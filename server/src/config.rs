//! Configuration loading for the Coinvault service
//!
//! A JSON file with every section optional:
//! - `server`: bind address
//! - `storage`: data directory for the journal, audit log and PIN store
//! - `market_data`: price source and staleness bound
//! - `trading`: fee rate
//! - `withdrawals`: PIN lockout policy and settlement retries

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Duration as ChronoDuration;
use coinvault_core::{Asset, AssetRegistry};
use coinvault_order_engine::EngineConfig;
use coinvault_portfolio::ValuationConfig;
use coinvault_withdrawal_guard::{GuardConfig, PinPolicy, SettlementPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration for the service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub market_data: MarketDataConfig,

    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub withdrawals: WithdrawalsConfig,
}

impl ServiceConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOST`, `PORT` and `PIN_PEPPER` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT '{}' is not a port number", port)))?;
        }
        if let Some(pepper) = lookup("PIN_PEPPER") {
            self.withdrawals.pin_pepper = pepper;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.fee_rate < Decimal::ZERO || self.trading.fee_rate >= Decimal::ONE {
            return Err(ConfigError::Invalid(format!(
                "trading.fee_rate must be in [0, 1), got {}",
                self.trading.fee_rate
            )));
        }
        if self.market_data.max_price_age_secs <= 0 {
            return Err(ConfigError::Invalid("market_data.max_price_age_secs must be positive".into()));
        }
        for (symbol, price) in &self.market_data.prices {
            Asset::new(symbol).map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if *price <= Decimal::ZERO {
                return Err(ConfigError::Invalid(format!("fixture price for {} must be positive", symbol)));
            }
        }
        if self.withdrawals.pin_pepper.is_empty() {
            return Err(ConfigError::Invalid("withdrawals.pin_pepper must not be empty".into()));
        }
        if self.withdrawals.max_pin_attempts == 0 {
            return Err(ConfigError::Invalid("withdrawals.max_pin_attempts must be at least 1".into()));
        }
        if self.withdrawals.settlement_attempts == 0 {
            return Err(ConfigError::Invalid("withdrawals.settlement_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn max_price_age(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.market_data.max_price_age_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_fee_rate(self.trading.fee_rate)
            .with_max_price_age(self.max_price_age())
    }

    pub fn guard_config(&self) -> GuardConfig {
        let w = &self.withdrawals;
        GuardConfig {
            assets: AssetRegistry::standard(),
            pin_policy: PinPolicy {
                max_attempts: w.max_pin_attempts,
                window: ChronoDuration::seconds(w.pin_window_secs),
                lockout: ChronoDuration::seconds(w.pin_lockout_secs),
            },
            settlement: SettlementPolicy {
                attempts: w.settlement_attempts,
                attempt_timeout: std::time::Duration::from_millis(w.settlement_timeout_ms),
                backoff: std::time::Duration::from_millis(w.settlement_backoff_ms),
            },
        }
    }

    pub fn valuation_config(&self) -> ValuationConfig {
        ValuationConfig {
            quote: Asset::usd(),
            max_price_age: self.max_price_age(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Where durable state lives; no directory means everything stays in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub const JOURNAL_FILE: &'static str = "journal.jsonl";
    pub const AUDIT_FILE: &'static str = "audit.jsonl";
    pub const PIN_FILE: &'static str = "pins.json";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    #[default]
    Fixture,
    CoinGecko,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(default)]
    pub provider: PriceSource,

    /// CoinGecko API root
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_max_price_age_secs")]
    pub max_price_age_secs: i64,

    /// Fixture prices in USD; empty means the built-in table
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
}

fn default_max_price_age_secs() -> i64 {
    EngineConfig::DEFAULT_MAX_PRICE_AGE_SECS
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            provider: PriceSource::default(),
            base_url: None,
            max_price_age_secs: default_max_price_age_secs(),
            prices: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
}

fn default_fee_rate() -> Decimal {
    EngineConfig::DEFAULT_FEE_RATE
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            fee_rate: default_fee_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalsConfig {
    /// Server-side secret mixed into every PIN hash
    #[serde(default = "default_pin_pepper")]
    pub pin_pepper: String,
    #[serde(default = "default_max_pin_attempts")]
    pub max_pin_attempts: u32,
    #[serde(default = "default_pin_window_secs")]
    pub pin_window_secs: i64,
    #[serde(default = "default_pin_lockout_secs")]
    pub pin_lockout_secs: i64,
    #[serde(default = "default_settlement_attempts")]
    pub settlement_attempts: u32,
    #[serde(default = "default_settlement_timeout_ms")]
    pub settlement_timeout_ms: u64,
    #[serde(default = "default_settlement_backoff_ms")]
    pub settlement_backoff_ms: u64,
}

fn default_pin_pepper() -> String {
    "coinvault-dev-pepper".to_string()
}

fn default_max_pin_attempts() -> u32 {
    5
}

fn default_pin_window_secs() -> i64 {
    15 * 60
}

fn default_pin_lockout_secs() -> i64 {
    15 * 60
}

fn default_settlement_attempts() -> u32 {
    3
}

fn default_settlement_timeout_ms() -> u64 {
    5_000
}

fn default_settlement_backoff_ms() -> u64 {
    250
}

impl Default for WithdrawalsConfig {
    fn default() -> Self {
        Self {
            pin_pepper: default_pin_pepper(),
            max_pin_attempts: default_max_pin_attempts(),
            pin_window_secs: default_pin_window_secs(),
            pin_lockout_secs: default_pin_lockout_secs(),
            settlement_attempts: default_settlement_attempts(),
            settlement_timeout_ms: default_settlement_timeout_ms(),
            settlement_backoff_ms: default_settlement_backoff_ms(),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_minimal_config() {
        let config = ServiceConfig::from_json("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.market_data.provider, PriceSource::Fixture);
        assert_eq!(config.trading.fee_rate, Decimal::new(1, 3));
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "server": { "host": "127.0.0.1", "port": 9100 },
            "storage": { "data_dir": "/var/lib/coinvault" },
            "market_data": {
                "provider": "coingecko",
                "base_url": "http://localhost:9999",
                "max_price_age_secs": 60
            },
            "trading": { "fee_rate": "0.002" },
            "withdrawals": { "pin_pepper": "s3cret", "settlement_attempts": 5 }
        }"#;

        let config = ServiceConfig::from_json(json).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.market_data.provider, PriceSource::CoinGecko);
        assert_eq!(config.max_price_age(), ChronoDuration::seconds(60));
        assert_eq!(config.engine_config().fee_rate, Decimal::new(2, 3));
        assert_eq!(config.guard_config().settlement.attempts, 5);
        assert_eq!(config.withdrawals.max_pin_attempts, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ServiceConfig::from_json(r#"{"trading": {"fee_rate": "1.5"}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServiceConfig::from_json(r#"{"market_data": {"prices": {"BTC": "-1"}}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServiceConfig::from_json(r#"{"server": {"port": "eighty"}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("PORT", "9000"), ("PIN_PEPPER", "from-env")].into_iter().collect();
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.withdrawals.pin_pepper, "from-env");

        let err = config.apply_overrides(|key| (key == "PORT").then(|| "nope".to_string()));
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_file("/nonexistent/coinvault.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

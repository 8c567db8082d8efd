//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bot.
//! All types derive Serde traits for deserialization from config files.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ledger::SubscriptionTerms;
use crate::types::{ChannelId, Usdt};

/// Placeholder admin key that validation refuses when the admin API is on.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the paywall bot.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PaywallConfig {
    /// Telegram bot and channel settings.
    pub telegram: TelegramConfig,

    /// Chain indexer (TronGrid) settings.
    pub indexer: IndexerConfig,

    /// Price, period and sweep cadence.
    pub subscription: SubscriptionConfig,

    /// Ledger backend.
    pub storage: StorageConfig,

    /// Retry configuration for indexer calls.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Telegram configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Chat id of the private channel being sold (usually negative).
    pub channel_id: i64,

    /// User id that receives operator alerts (invite failures).
    pub operator_id: Option<u64>,

    /// Environment variable holding the bot token.
    pub bot_token_env: String,
}

impl TelegramConfig {
    pub fn channel(&self) -> ChannelId {
        ChannelId(self.channel_id)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            operator_id: None,
            bot_token_env: "BOT_TOKEN".to_string(),
        }
    }
}

/// Chain indexer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// TronGrid base URL.
    pub base_url: String,

    /// Environment variable holding the TronGrid API key.
    pub api_key_env: String,

    /// USDT TRC-20 contract address (base58).
    pub token_contract: String,

    /// Same contract in hex form, for responses that use it.
    pub token_contract_hex: String,

    /// Wallet users pay into (base58, shown to users).
    pub wallet_address: String,

    /// Same wallet in hex form. TronGrid reports event recipients in hex.
    pub wallet_address_hex: String,

    /// Require the transfer recipient to be our wallet.
    pub verify_recipient: bool,

    /// Only accept transactions already confirmed on chain.
    pub only_confirmed: bool,

    /// Per-attempt request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.trongrid.io".to_string(),
            api_key_env: "TRONGRID_KEY".to_string(),
            token_contract: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            token_contract_hex: "41a614f803b6fd780986a42c78ec9c7f77e6ded13c".to_string(),
            wallet_address: String::new(),
            wallet_address_hex: String::new(),
            verify_recipient: true,
            only_confirmed: true,
            request_timeout_secs: 15,
        }
    }
}

/// Subscription pricing and expiry sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Price of one period in USDT (`10` or `"9.99"`).
    pub price: Usdt,

    /// Length of one period in days.
    pub period_days: u32,

    /// Interval between expiry sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl SubscriptionConfig {
    pub fn terms(&self) -> SubscriptionTerms {
        SubscriptionTerms {
            price: self.price,
            period: Duration::days(i64::from(self.period_days)),
        }
    }
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            price: Usdt::from_whole(10),
            period_days: 30,
            sweep_interval_secs: 30 * 60,
        }
    }
}

/// Ledger backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// SQLite connection URL.
    pub database_url: String,

    /// Snapshot file for the memory backend. `None` keeps state in memory only.
    pub snapshot_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_url: "sqlite://paywall.db".to_string(),
            snapshot_path: None,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PaywallConfig::default();
        assert_eq!(config.subscription.price, Usdt::from_whole(10));
        assert_eq!(config.subscription.sweep_interval_secs, 1800);
        assert_eq!(config.indexer.request_timeout_secs, 15);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.indexer.verify_recipient);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PaywallConfig = toml::from_str(
            r#"
            [telegram]
            channel_id = -1001234567890

            [subscription]
            price = "12.5"
            period_days = 7

            [storage]
            backend = "memory"
            snapshot_path = "ledger.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.channel(), ChannelId(-1001234567890));
        assert_eq!(config.telegram.bot_token_env, "BOT_TOKEN");
        let terms = config.subscription.terms();
        assert_eq!(terms.price, Usdt::from_micros(12_500_000));
        assert_eq!(terms.period, Duration::days(7));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.snapshot_path.as_deref(), Some("ledger.json"));
        assert_eq!(config.retries.max_attempts, 3);
    }
}

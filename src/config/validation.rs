//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, price > 0)
//! - Check that addresses are usable for matching indexer events
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PaywallConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{PaywallConfig, StorageBackend, PLACEHOLDER_ADMIN_KEY};
use crate::indexer::types::AddressForm;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `subscription.price`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PaywallConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.telegram.channel_id == 0 {
        errors.push(ValidationError::new("telegram.channel_id", "must be set"));
    }
    if config.telegram.bot_token_env.trim().is_empty() {
        errors.push(ValidationError::new("telegram.bot_token_env", "must name an environment variable"));
    }

    let indexer = &config.indexer;
    if url::Url::parse(&indexer.base_url).is_err() {
        errors.push(ValidationError::new("indexer.base_url", format!("'{}' is not a valid URL", indexer.base_url)));
    }
    if indexer.request_timeout_secs == 0 {
        errors.push(ValidationError::new("indexer.request_timeout_secs", "must be greater than 0"));
    }
    if !matches!(AddressForm::parse(&indexer.token_contract), AddressForm::Base58(_)) {
        errors.push(ValidationError::new("indexer.token_contract", "must be a base58 Tron address"));
    }
    if !indexer.token_contract_hex.is_empty()
        && !matches!(AddressForm::parse(&indexer.token_contract_hex), AddressForm::Hex(_))
    {
        errors.push(ValidationError::new("indexer.token_contract_hex", "must be a hex Tron address"));
    }
    if !matches!(AddressForm::parse(&indexer.wallet_address), AddressForm::Base58(_)) {
        errors.push(ValidationError::new("indexer.wallet_address", "must be a base58 Tron address"));
    }
    if indexer.verify_recipient && !matches!(AddressForm::parse(&indexer.wallet_address_hex), AddressForm::Hex(_)) {
        errors.push(ValidationError::new(
            "indexer.wallet_address_hex",
            "must be a hex Tron address when verify_recipient is enabled",
        ));
    }

    let subscription = &config.subscription;
    if subscription.price.is_zero() {
        errors.push(ValidationError::new("subscription.price", "must be greater than 0"));
    }
    if subscription.period_days == 0 {
        errors.push(ValidationError::new("subscription.period_days", "must be greater than 0"));
    }
    if subscription.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("subscription.sweep_interval_secs", "must be greater than 0"));
    }

    if config.storage.backend == StorageBackend::Sqlite && !config.storage.database_url.starts_with("sqlite:") {
        errors.push(ValidationError::new("storage.database_url", "must be a sqlite: URL"));
    }
    if let Some(path) = &config.storage.snapshot_path {
        if path.trim().is_empty() {
            errors.push(ValidationError::new("storage.snapshot_path", "must not be empty when set"));
        }
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new("retries.base_delay_ms", "must not exceed max_delay_ms"));
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "must be a socket address"));
    }

    let admin = &config.admin;
    if admin.enabled {
        if admin.api_key.is_empty() || admin.api_key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new("admin.api_key", "must be changed from the placeholder"));
        }
        if admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PaywallConfig {
        let mut config = PaywallConfig::default();
        config.telegram.channel_id = -1001234567890;
        config.indexer.wallet_address = "TMTUZTTHcJjK75twuQTZtdpJQVysHzEc7X".to_string();
        config.indexer.wallet_address_hex = "417e0204a904ec3271e0733b498756d89fc01125c2".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn test_defaults_need_channel_and_wallet() {
        let errors = validate_config(&PaywallConfig::default()).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"telegram.channel_id"));
        assert!(fields.contains(&"indexer.wallet_address"));
        assert!(fields.contains(&"indexer.wallet_address_hex"));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = valid_config();
        config.subscription.price = crate::types::Usdt::ZERO;
        config.subscription.sweep_interval_secs = 0;
        config.indexer.request_timeout_secs = 0;
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.field == "admin.api_key"));
    }

    #[test]
    fn test_recipient_hex_optional_when_check_disabled() {
        let mut config = valid_config();
        config.indexer.verify_recipient = false;
        config.indexer.wallet_address_hex.clear();
        assert_eq!(validate_config(&config), Ok(()));
    }
}

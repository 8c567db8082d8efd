//! Configuration loading from disk and secrets from the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::PaywallConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
    MissingSecret(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
            ConfigError::MissingSecret(var) => write!(f, "Environment variable {} not set", var),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PaywallConfig, ConfigError> {
    let config: PaywallConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PaywallConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Secrets read from the environment at startup. Never logged.
pub struct Secrets {
    pub bot_token: String,
    pub indexer_api_key: Option<String>,
}

impl Secrets {
    /// Read secrets named by `config`. The bot token is required; the
    /// indexer key is optional (TronGrid works without one, rate limited).
    pub fn from_env(config: &PaywallConfig) -> Result<Self, ConfigError> {
        let bot_token = read_env(&config.telegram.bot_token_env)
            .ok_or_else(|| ConfigError::MissingSecret(config.telegram.bot_token_env.clone()))?;
        let indexer_api_key = read_env(&config.indexer.api_key_env);
        if indexer_api_key.is_none() {
            tracing::warn!(
                var = %config.indexer.api_key_env,
                "No TronGrid API key set, requests will be rate limited"
            );
        }
        Ok(Self { bot_token, indexer_api_key })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &"<redacted>")
            .field("indexer_api_key", &self.indexer_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PaywallConfig (validated, immutable)
//!     → values copied into subsystems at startup
//!
//! environment
//!     → loader.rs Secrets (bot token, indexer API key)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets never live in the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, Secrets};
pub use schema::{
    AdminConfig, IndexerConfig, LogFormat, ObservabilityConfig, PaywallConfig, RetryConfig, StorageBackend,
    StorageConfig, SubscriptionConfig, TelegramConfig,
};

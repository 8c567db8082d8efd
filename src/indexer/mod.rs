//! Payment verification against the TronGrid chain indexer.
//!
//! # Data Flow
//! ```text
//! TxId from user
//!     → client.rs (GET /v1/transactions/{id}/events, timeout + retry)
//!     → types.rs (decode, pick Transfer on USDT contract to our wallet)
//!     → VerifiedTransfer { amount } | VerifyError
//! ```
//!
//! # Security Constraints
//! - API key ONLY from environment variables, never logged
//! - Destination wallet is checked unless explicitly disabled
//! - Every request has a deadline

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::types::TxId;

pub use client::TronGridClient;
pub use types::{AddressMatcher, IndexerConfig, VerifiedTransfer, VerifyError};

/// Confirms that a transaction id is a qualifying payment.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, tx_id: &TxId) -> Result<VerifiedTransfer, VerifyError>;
}

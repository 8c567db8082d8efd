//! Channel membership and messaging capability.
//!
//! The subscription engine and the expiry sweep only see [`ChannelGateway`];
//! the Telegram implementation lives in `telegram.rs`.

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChannelId, UserId};

pub use telegram::TelegramGateway;

/// Errors returned by a channel gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The messaging API rejected or failed the request.
    #[error("messaging API error: {0}")]
    Api(String),

    /// No operator chat is configured.
    #[error("no operator configured")]
    NoOperator,
}

/// Narrow capability over the messaging platform.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Create an invite link to `channel` that admits exactly one member.
    async fn create_single_use_invite(&self, channel: ChannelId) -> Result<String, GatewayError>;

    /// Remove `user` from `channel` without banning them permanently.
    async fn revoke_membership(&self, channel: ChannelId, user: UserId) -> Result<(), GatewayError>;

    /// Send a plain-text message to `user`.
    async fn notify(&self, user: UserId, text: &str) -> Result<(), GatewayError>;

    /// Send a plain-text alert to the operator.
    async fn notify_operator(&self, text: &str) -> Result<(), GatewayError>;
}

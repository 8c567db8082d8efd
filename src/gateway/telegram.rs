//! Telegram Bot API implementation of [`ChannelGateway`].

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UserId as TgUserId};

use crate::gateway::{ChannelGateway, GatewayError};
use crate::types::{ChannelId, UserId};

/// Gateway backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    operator: Option<UserId>,
}

impl TelegramGateway {
    pub fn new(bot: Bot, operator: Option<UserId>) -> Self {
        Self { bot, operator }
    }
}

fn api_error(e: teloxide::RequestError) -> GatewayError {
    GatewayError::Api(e.to_string())
}

fn chat(user: UserId) -> ChatId {
    ChatId::from(TgUserId(user.0))
}

#[async_trait]
impl ChannelGateway for TelegramGateway {
    async fn create_single_use_invite(&self, channel: ChannelId) -> Result<String, GatewayError> {
        let link = self
            .bot
            .create_chat_invite_link(ChatId(channel.0))
            .member_limit(1)
            .await
            .map_err(api_error)?;
        Ok(link.invite_link)
    }

    async fn revoke_membership(&self, channel: ChannelId, user: UserId) -> Result<(), GatewayError> {
        // Ban then unban: removes the member but lets them rejoin after paying again.
        self.bot
            .ban_chat_member(ChatId(channel.0), TgUserId(user.0))
            .await
            .map_err(api_error)?;
        self.bot
            .unban_chat_member(ChatId(channel.0), TgUserId(user.0))
            .only_if_banned(true)
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn notify(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        self.bot.send_message(chat(user), text).await.map_err(api_error)?;
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<(), GatewayError> {
        let operator = self.operator.ok_or(GatewayError::NoOperator)?;
        self.notify(operator, text).await
    }
}

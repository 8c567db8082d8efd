use std::sync::Arc;
use teloxide::prelude::*;

use crate::bot::{messages, BotContext};
use crate::types::{TxId, UserId, TX_ID_LEN};

/// What an incoming text message asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// `/start` or `/help`.
    Status,
    /// A well-formed transaction id.
    Token(TxId),
    /// Anything else.
    Other,
}

pub fn classify(text: &str) -> Input {
    let text = text.trim();
    let command = text
        .split_whitespace()
        .next()
        .map(|word| word.split('@').next().unwrap_or(word))
        .unwrap_or_default();

    if command == "/start" || command == "/help" {
        return Input::Status;
    }
    if text.len() == TX_ID_LEN {
        if let Ok(tx_id) = TxId::parse(text) {
            return Input::Token(tx_id);
        }
    }
    Input::Other
}

pub async fn handle_message(bot: Bot, msg: Message, ctx: Arc<BotContext>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0);

    let input = msg.text().map(classify).unwrap_or(Input::Other);
    match input {
        Input::Status => send_status(&bot, &msg, &ctx, user_id).await,
        Input::Token(tx_id) => handle_token(&bot, &msg, &ctx, user_id, tx_id).await,
        Input::Other => {
            bot.send_message(msg.chat.id, messages::HINT).await?;
            Ok(())
        }
    }
}

async fn send_status(bot: &Bot, msg: &Message, ctx: &BotContext, user_id: UserId) -> ResponseResult<()> {
    let text = match ctx.service.account_status(user_id).await {
        Ok(account) => messages::status(
            &account,
            ctx.service.terms(),
            &ctx.wallet,
            ctx.service.clock().now(),
        ),
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Failed to load account");
            messages::INTERNAL_ERROR.to_string()
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_token(bot: &Bot, msg: &Message, ctx: &BotContext, user_id: UserId, tx_id: TxId) -> ResponseResult<()> {
    tracing::info!(user_id = %user_id, tx_id = %tx_id, "Transaction id submitted");
    let pending = bot.send_message(msg.chat.id, messages::CHECKING).await?;

    let text = match ctx.service.handle_submitted_token(user_id, &tx_id).await {
        Ok(outcome) => messages::outcome(&outcome),
        Err(e) => {
            tracing::error!(user_id = %user_id, tx_id = %tx_id, error = %e, "Submission failed");
            messages::INTERNAL_ERROR.to_string()
        }
    };

    bot.edit_message_text(msg.chat.id, pending.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "9f3c2a1b4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f8";

    #[test]
    fn test_commands() {
        assert_eq!(classify("/start"), Input::Status);
        assert_eq!(classify("/help"), Input::Status);
        assert_eq!(classify("/start@paywall_bot"), Input::Status);
        assert_eq!(classify("/stop"), Input::Other);
    }

    #[test]
    fn test_token_is_trimmed_and_lowercased() {
        let input = classify(&format!("  {}\n", TX.to_uppercase()));
        assert_eq!(input, Input::Token(TxId::parse(TX).unwrap()));
    }

    #[test]
    fn test_non_tokens() {
        assert_eq!(classify("hello"), Input::Other);
        assert_eq!(classify(&TX[..63]), Input::Other);
        assert_eq!(classify(&"z".repeat(64)), Input::Other);
        assert_eq!(classify(""), Input::Other);
    }
}

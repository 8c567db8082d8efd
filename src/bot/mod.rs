//! Telegram front door.
//!
//! Receives messages by long polling, hands transaction ids to the
//! [`SubscriptionService`] and renders the outcome. Holds no state of its
//! own beyond the shared [`BotContext`].

pub mod handlers;
pub mod messages;

use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tokio::sync::broadcast;

use crate::subscription::SubscriptionService;

pub use handlers::{classify, Input};

/// Dependencies injected into every handler.
pub struct BotContext {
    pub service: Arc<SubscriptionService>,
    /// Wallet shown to users in payment instructions.
    pub wallet: String,
}

/// Run the dispatcher until `shutdown` fires.
pub async fn run_dispatcher(bot: Bot, context: Arc<BotContext>, mut shutdown: broadcast::Receiver<()>) {
    let handler = Update::filter_message().endpoint(handlers::handle_message);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![context])
        .default_handler(|update| async move {
            tracing::trace!(update_id = ?update.id, "Unhandled update");
        })
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        let _ = shutdown.recv().await;
        // The token refuses while the dispatcher is still starting up.
        for _ in 0..50 {
            match token.shutdown() {
                Ok(done) => {
                    done.await;
                    tracing::info!("Telegram dispatcher stopped");
                    return;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
        tracing::warn!("Telegram dispatcher did not accept the shutdown request");
    });

    tracing::info!("Telegram dispatcher starting");
    dispatcher.dispatch().await;
}

//! Channel paywall bot.
//!
//! ```text
//!   Telegram ──▶ bot (dispatcher) ──▶ SubscriptionService ──▶ indexer (TronGrid)
//!                                          │
//!                                          ├──▶ ledger (SQLite | memory)
//!                                          └──▶ gateway (invite links)
//!
//!   ticker ──▶ ExpirySweeper ──▶ ledger + gateway (revoke, notify)
//!   admin API ──▶ ledger views, manual sweep
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio::net::TcpListener;

use channel_paywall::admin::{self, AdminState};
use channel_paywall::bot::{self, BotContext};
use channel_paywall::config::validation::validate_config;
use channel_paywall::config::{load_config, ConfigError, PaywallConfig, Secrets};
use channel_paywall::gateway::{ChannelGateway, TelegramGateway};
use channel_paywall::indexer::{PaymentVerifier, TronGridClient};
use channel_paywall::lifecycle::{build_ledger, wait_for_shutdown, Shutdown};
use channel_paywall::observability::{logging, metrics};
use channel_paywall::resilience::RetryPolicy;
use channel_paywall::subscription::{Clock, ExpirySweeper, SubscriptionService, SystemClock};
use channel_paywall::types::UserId;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "channel-paywall")]
#[command(about = "Telegram bot selling channel access for USDT (TRC-20)", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "paywall.toml")]
    config: PathBuf,
}

/// Load the config file, or fall back to defaults when it does not exist.
fn load_or_default(path: &Path) -> Result<PaywallConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("warning: config file {} not found, using defaults", path.display());
            let config = PaywallConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
        other => other,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_or_default(&args.config)?;

    logging::init_tracing(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %args.config.display(), "channel-paywall starting");

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let secrets = Secrets::from_env(&config)?;
    let terms = config.subscription.terms();
    let channel = config.telegram.channel();

    tracing::info!(
        channel_id = config.telegram.channel_id,
        price = %terms.price,
        period_days = config.subscription.period_days,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let ledger = build_ledger(&config.storage, terms).await?;

    let retry = RetryPolicy::from(&config.retries);
    let verifier: Arc<dyn PaymentVerifier> =
        Arc::new(TronGridClient::new(&config.indexer, secrets.indexer_api_key.clone(), retry)?);

    let telegram = Bot::new(&secrets.bot_token);
    let gateway: Arc<dyn ChannelGateway> =
        Arc::new(TelegramGateway::new(telegram.clone(), config.telegram.operator_id.map(UserId)));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let service = Arc::new(SubscriptionService::new(
        ledger.clone(),
        verifier,
        gateway.clone(),
        clock.clone(),
        channel,
        terms,
    ));
    let sweeper = Arc::new(ExpirySweeper::new(
        ledger.clone(),
        gateway,
        clock,
        channel,
        Duration::from_secs(config.subscription.sweep_interval_secs),
    ));

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    {
        let sweeper = sweeper.clone();
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move { sweeper.run(rx).await }));
    }

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(service.clone(), sweeper.clone(), &config.admin.api_key);
        let router = admin::setup_admin_router(state, Duration::from_secs(config.admin.request_timeout_secs));
        let rx = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, router, rx).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    let context = Arc::new(BotContext {
        service,
        wallet: config.indexer.wallet_address.clone(),
    });
    let dispatcher = tokio::spawn(bot::run_dispatcher(telegram, context, shutdown.subscribe()));
    tasks.push(dispatcher);

    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received, stopping tasks");
    shutdown.trigger();
    shutdown.drain(tasks, SHUTDOWN_DEADLINE).await;

    if let Err(e) = ledger.flush().await {
        tracing::error!(error = %e, "Failed to flush ledger");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Periodic expiry sweep.
//!
//! # Responsibilities
//! - Find accounts whose expiry has passed
//! - Remove them from the channel, then clear the expiry
//! - Tell them their access ended (best effort)
//!
//! # Ordering
//! Revoke happens before the ledger is touched. A failed revoke leaves the
//! expiry in place so the next sweep retries the account. The clear is a
//! compare-and-clear against the expiry observed at listing time, so a user
//! who renews mid-sweep keeps the new term.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};

use crate::gateway::ChannelGateway;
use crate::ledger::{ExpiredAccount, Ledger, LedgerResult};
use crate::observability::metrics;
use crate::subscription::clock::Clock;
use crate::subscription::notices;
use crate::types::ChannelId;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Accounts found with `expiry <= now`.
    pub expired: u64,
    /// Revoked and cleared.
    pub revoked: u64,
    /// Revoke or clear failed; retried next sweep.
    pub failed: u64,
    /// Renewed or cleared by someone else while the sweep ran.
    pub skipped: u64,
}

enum AccountResult {
    Revoked,
    Failed,
    Skipped,
}

impl AccountResult {
    fn label(&self) -> &'static str {
        match self {
            AccountResult::Revoked => "revoked",
            AccountResult::Failed => "failed",
            AccountResult::Skipped => "skipped",
        }
    }
}

/// Background task that revokes lapsed subscriptions.
pub struct ExpirySweeper {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn ChannelGateway>,
    clock: Arc<dyn Clock>,
    channel: ChannelId,
    interval: Duration,
    // Timer and admin-triggered sweeps must not revoke the same account twice.
    running: Mutex<()>,
}

impl ExpirySweeper {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn ChannelGateway>,
        clock: Arc<dyn Clock>,
        channel: ChannelId,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            gateway,
            clock,
            channel,
            interval,
            running: Mutex::new(()),
        }
    }

    /// Sweep every `interval` until shutdown.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Expiry sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Process every currently expired account once.
    ///
    /// Only listing can fail the whole sweep; per-account failures are
    /// counted in the report.
    pub async fn sweep_once(&self) -> LedgerResult<SweepReport> {
        let _guard = self.running.lock().await;

        let now = self.clock.now();
        let expired = self.ledger.list_expired(now).await?;
        let mut report = SweepReport {
            expired: expired.len() as u64,
            ..SweepReport::default()
        };

        if expired.is_empty() {
            tracing::debug!("No expired subscriptions");
            return Ok(report);
        }

        for account in &expired {
            let result = self.sweep_account(account).await;
            metrics::record_sweep_account(result.label());
            match result {
                AccountResult::Revoked => report.revoked += 1,
                AccountResult::Failed => report.failed += 1,
                AccountResult::Skipped => report.skipped += 1,
            }
        }

        tracing::info!(
            expired = report.expired,
            revoked = report.revoked,
            failed = report.failed,
            skipped = report.skipped,
            "Expiry sweep complete"
        );
        Ok(report)
    }

    async fn sweep_account(&self, account: &ExpiredAccount) -> AccountResult {
        let user_id = account.user_id;

        if let Err(e) = self.gateway.revoke_membership(self.channel, user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to revoke channel membership, will retry");
            return AccountResult::Failed;
        }

        match self.ledger.clear_expiry(user_id, account.expiry).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(user_id = %user_id, "Expiry changed during sweep, not clearing");
                self.reinvite_if_renewed(account).await;
                return AccountResult::Skipped;
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to clear expiry");
                return AccountResult::Failed;
            }
        }

        tracing::info!(user_id = %user_id, expiry = %account.expiry, "Subscription expired, access revoked");

        if let Err(e) = self.gateway.notify(user_id, notices::EXPIRED).await {
            tracing::debug!(user_id = %user_id, error = %e, "Failed to send expiry notice");
        }
        AccountResult::Revoked
    }

    /// The user was just removed but holds a fresh term: hand them a new link.
    async fn reinvite_if_renewed(&self, account: &ExpiredAccount) {
        let user_id = account.user_id;
        let renewed = match self.ledger.account(user_id).await {
            Ok(Some(current)) => current.is_active(self.clock.now()),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to reload account after sweep race");
                false
            }
        };
        if !renewed {
            return;
        }

        match self.gateway.create_single_use_invite(self.channel).await {
            Ok(link) => {
                if let Err(e) = self.gateway.notify(user_id, &notices::renewed_invite(&link)).await {
                    tracing::warn!(user_id = %user_id, error = %e, "Failed to deliver renewal invite");
                }
            }
            Err(e) => {
                metrics::record_invite_failure();
                tracing::error!(user_id = %user_id, error = %e, "Failed to create renewal invite");
            }
        }
    }
}

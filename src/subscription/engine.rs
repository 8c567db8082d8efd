//! Subscription engine: turns a submitted transaction id into a credit.

use std::sync::Arc;
use thiserror::Error;

use crate::gateway::ChannelGateway;
use crate::indexer::PaymentVerifier;
use crate::ledger::{Account, Ledger, LedgerError, SubscriptionTerms};
use crate::observability::metrics;
use crate::subscription::clock::Clock;
use crate::subscription::notices;
use crate::subscription::outcome::{InviteStatus, Outcome};
use crate::types::{ChannelId, TxId, UserId};

/// Errors the front door has to handle itself.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// The payment flow, constructed once at startup and shared by handle.
pub struct SubscriptionService {
    ledger: Arc<dyn Ledger>,
    verifier: Arc<dyn PaymentVerifier>,
    gateway: Arc<dyn ChannelGateway>,
    clock: Arc<dyn Clock>,
    channel: ChannelId,
    terms: SubscriptionTerms,
}

impl SubscriptionService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        verifier: Arc<dyn PaymentVerifier>,
        gateway: Arc<dyn ChannelGateway>,
        clock: Arc<dyn Clock>,
        channel: ChannelId,
        terms: SubscriptionTerms,
    ) -> Self {
        Self {
            ledger,
            verifier,
            gateway,
            clock,
            channel,
            terms,
        }
    }

    pub fn terms(&self) -> &SubscriptionTerms {
        &self.terms
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current account state, creating the account on first contact.
    pub async fn account_status(&self, user_id: UserId) -> Result<Account, ServiceError> {
        Ok(self.ledger.get_or_create_account(user_id).await?)
    }

    /// Verify `tx_id` on chain and credit it to `user_id`.
    pub async fn handle_submitted_token(&self, user_id: UserId, tx_id: &TxId) -> Result<Outcome, ServiceError> {
        let outcome = self.process(user_id, tx_id).await;
        match &outcome {
            Ok(outcome) => metrics::record_submission(outcome.label()),
            Err(_) => metrics::record_submission("error"),
        }
        outcome
    }

    async fn process(&self, user_id: UserId, tx_id: &TxId) -> Result<Outcome, ServiceError> {
        self.ledger.get_or_create_account(user_id).await?;

        if self.ledger.is_consumed(tx_id).await? {
            tracing::info!(user_id = %user_id, tx_id = %tx_id, "Transaction already consumed");
            return Ok(Outcome::AlreadyUsed);
        }

        let transfer = match self.verifier.verify(tx_id).await {
            Ok(transfer) => transfer,
            Err(reason) => {
                tracing::warn!(
                    user_id = %user_id,
                    tx_id = %tx_id,
                    reason = reason.label(),
                    error = %reason,
                    "Transaction not verified"
                );
                return Ok(Outcome::NotFound { reason });
            }
        };

        let now = self.clock.now();
        let receipt = match self
            .ledger
            .credit_and_maybe_activate(user_id, tx_id, transfer.amount, now)
            .await
        {
            Ok(receipt) => receipt,
            Err(LedgerError::AlreadyConsumed(_)) => {
                tracing::warn!(user_id = %user_id, tx_id = %tx_id, "Transaction consumed concurrently");
                return Ok(Outcome::AlreadyUsed);
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            user_id = %user_id,
            tx_id = %tx_id,
            amount = %transfer.amount,
            recipient = transfer.recipient.as_deref().unwrap_or("unknown"),
            balance = %receipt.balance,
            activated = receipt.activated,
            "Payment credited"
        );

        let expiry = match (receipt.activated, receipt.expiry) {
            (true, Some(expiry)) => expiry,
            _ => {
                return Ok(Outcome::PartiallyCredited {
                    amount: transfer.amount,
                    balance: receipt.balance,
                    remaining: self.terms.price.saturating_sub(receipt.balance),
                });
            }
        };

        metrics::record_activation();
        let invite = self.issue_invite(user_id, tx_id).await;

        Ok(Outcome::Activated {
            amount: transfer.amount,
            balance: receipt.balance,
            expiry,
            invite,
        })
    }

    /// Create an invite link. Failure never undoes the credit.
    async fn issue_invite(&self, user_id: UserId, tx_id: &TxId) -> InviteStatus {
        match self.gateway.create_single_use_invite(self.channel).await {
            Ok(link) => InviteStatus::Created(link),
            Err(e) => {
                metrics::record_invite_failure();
                tracing::error!(user_id = %user_id, tx_id = %tx_id, error = %e, "Failed to create invite link");

                let alert = notices::invite_failure_alert(user_id, tx_id, &e.to_string());
                let operator_alerted = match self.gateway.notify_operator(&alert).await {
                    Ok(()) => true,
                    Err(alert_err) => {
                        tracing::error!(user_id = %user_id, error = %alert_err, "Failed to alert operator");
                        false
                    }
                };
                InviteStatus::Failed {
                    error: e.to_string(),
                    operator_alerted,
                }
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("channel", &self.channel)
            .field("terms", &self.terms)
            .finish()
    }
}

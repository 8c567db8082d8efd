//! Results of handling a submitted transaction id.

use chrono::{DateTime, Utc};

use crate::indexer::VerifyError;
use crate::types::Usdt;

/// Whether the invite link for a fresh activation could be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteStatus {
    Created(String),
    /// The credit stands. `operator_alerted` is false when the alert could
    /// not be delivered (no operator configured, or the send failed).
    Failed { error: String, operator_alerted: bool },
}

/// What happened to a submitted transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The credit crossed the price: subscription activated or renewed.
    Activated {
        amount: Usdt,
        balance: Usdt,
        expiry: DateTime<Utc>,
        invite: InviteStatus,
    },
    /// Credited, but the balance is still below the price.
    PartiallyCredited {
        amount: Usdt,
        balance: Usdt,
        remaining: Usdt,
    },
    /// The transaction id was claimed before (by anyone).
    AlreadyUsed,
    /// No qualifying transfer could be confirmed. Nothing was recorded; the
    /// user may retry. `reason` is for logs, not for the user.
    NotFound { reason: VerifyError },
}

impl Outcome {
    /// Short label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Activated { .. } => "activated",
            Outcome::PartiallyCredited { .. } => "partially_credited",
            Outcome::AlreadyUsed => "already_used",
            Outcome::NotFound { .. } => "not_found",
        }
    }
}

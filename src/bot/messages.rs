//! User-facing text. Plain text only, so nothing here needs escaping.

use chrono::{DateTime, Utc};

use crate::ledger::{Account, SubscriptionTerms};
use crate::subscription::{InviteStatus, Outcome};

pub const CHECKING: &str = "Checking the transaction on chain...";

pub const HINT: &str = "Send the 64-character TXID of your USDT (TRC-20) transfer, or /start to see your status.";

pub const INTERNAL_ERROR: &str = "Something went wrong on our side. Your payment is safe; please try again in a few minutes.";

fn format_expiry(expiry: DateTime<Utc>) -> String {
    expiry.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Greeting with payment instructions and the caller's current state.
pub fn status(account: &Account, terms: &SubscriptionTerms, wallet: &str, now: DateTime<Utc>) -> String {
    let state = match account.expiry {
        Some(expiry) if expiry > now => format!("active until {}", format_expiry(expiry)),
        _ => "no active subscription".to_string(),
    };

    format!(
        "Channel subscription\n\n\
         Price: {} USDT for {} days\n\
         Your balance: {} USDT\n\
         Status: {}\n\n\
         Top-up address (TRC-20 network):\n{}\n\n\
         Send the TXID of your transfer to credit it.",
        terms.price,
        terms.period.num_days(),
        account.balance,
        state,
        wallet,
    )
}

/// Render a submission outcome.
pub fn outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Activated {
            amount,
            balance,
            expiry,
            invite,
        } => {
            let access = match invite {
                InviteStatus::Created(link) => format!("Your invite link: {}", link),
                InviteStatus::Failed {
                    operator_alerted: true,
                    ..
                } => "We could not create your invite link. The operator has been notified and will send it to you."
                    .to_string(),
                InviteStatus::Failed {
                    operator_alerted: false,
                    ..
                } => "We could not create your invite link. Your payment is recorded; please contact support to get access."
                    .to_string(),
            };
            format!(
                "Subscription active until {}\n\nCredited: {} USDT\nRemaining balance: {} USDT\n\n{}",
                format_expiry(*expiry),
                amount,
                balance,
                access
            )
        }
        Outcome::PartiallyCredited {
            amount,
            balance,
            remaining,
        } => format!(
            "Funds credited\n\nReceived: {} USDT\nCurrent balance: {} USDT\nTop up {} USDT more to activate.",
            amount, balance, remaining
        ),
        Outcome::AlreadyUsed => "This transaction has already been used.".to_string(),
        Outcome::NotFound { .. } => {
            "Transaction not found or not yet confirmed. Wait a minute or two and send it again.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::VerifyError;
    use crate::types::{UserId, Usdt};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_status_inactive() {
        let account = Account::new(UserId(7));
        let text = status(&account, &SubscriptionTerms::default(), "TWallet", now());
        assert!(text.contains("Price: 10.00 USDT for 30 days"));
        assert!(text.contains("no active subscription"));
        assert!(text.contains("TWallet"));
    }

    #[test]
    fn test_status_active() {
        let mut account = Account::new(UserId(7));
        account.expiry = Some(now() + Duration::days(3));
        let text = status(&account, &SubscriptionTerms::default(), "TWallet", now());
        assert!(text.contains("active until 2026-03-04 12:00 UTC"));
    }

    #[test]
    fn test_partial_credit_text() {
        let text = outcome(&Outcome::PartiallyCredited {
            amount: Usdt::from_whole(4),
            balance: Usdt::from_whole(4),
            remaining: Usdt::from_whole(6),
        });
        assert!(text.contains("Top up 6.00 USDT more"));
    }

    #[test]
    fn test_invite_failure_text_hides_error() {
        let text = outcome(&Outcome::Activated {
            amount: Usdt::from_whole(10),
            balance: Usdt::ZERO,
            expiry: now(),
            invite: InviteStatus::Failed {
                error: "Bad Request: not enough rights".into(),
                operator_alerted: true,
            },
        });
        assert!(!text.contains("not enough rights"));
        assert!(text.contains("operator has been notified"));
    }

    #[test]
    fn test_invite_failure_without_alert_does_not_claim_notification() {
        let text = outcome(&Outcome::Activated {
            amount: Usdt::from_whole(10),
            balance: Usdt::ZERO,
            expiry: now(),
            invite: InviteStatus::Failed {
                error: "Bad Request: not enough rights".into(),
                operator_alerted: false,
            },
        });
        assert!(!text.contains("operator has been notified"));
        assert!(text.contains("contact support"));
    }

    #[test]
    fn test_not_found_hides_reason() {
        let text = outcome(&Outcome::NotFound {
            reason: VerifyError::Status(503),
        });
        assert!(!text.contains("503"));
    }
}

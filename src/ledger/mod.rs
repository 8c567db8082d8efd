//! Ledger of balances, subscription expiries and consumed transactions.
//!
//! # Data Flow
//! ```text
//! verified transfer
//!     → Ledger::credit_and_maybe_activate (one atomic unit)
//!         ├─ record tx_id as consumed (unique, append-only)
//!         ├─ balance += amount
//!         └─ balance >= price ? balance -= price, expiry = max(now, expiry) + period
//!
//! expiry sweep
//!     → Ledger::list_expired(now)
//!     → Ledger::clear_expiry(user, observed_expiry)   (compare-and-clear)
//! ```
//!
//! # Backends
//! - `sqlite.rs`: SQL transaction, uniqueness enforced by the primary key
//! - `memory.rs`: single mutex, optional JSON snapshot on every mutation

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{TxId, UserId, Usdt};

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

/// Price and length of one subscription period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionTerms {
    pub price: Usdt,
    pub period: Duration,
}

impl Default for SubscriptionTerms {
    fn default() -> Self {
        Self {
            price: Usdt::from_whole(10),
            period: Duration::days(30),
        }
    }
}

/// A user's balance and subscription state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: Usdt,
    pub expiry: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Usdt::ZERO,
            expiry: None,
        }
    }

    /// Check if the subscription is active at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry > now)
    }
}

/// Result of a successful credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditReceipt {
    /// True when this credit crossed the price threshold.
    pub activated: bool,
    /// Balance left after the credit (and the price deduction, if any).
    pub balance: Usdt,
    pub expiry: Option<DateTime<Utc>>,
}

/// An account whose subscription has run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredAccount {
    pub user_id: UserId,
    pub expiry: DateTime<Utc>,
}

/// A transaction id claimed by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedTransaction {
    pub tx_id: TxId,
    pub user_id: UserId,
    pub amount: Usdt,
    pub credited_at: DateTime<Utc>,
}

/// Aggregate counters for the admin API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub accounts: u64,
    pub active: u64,
    pub consumed: u64,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The transaction id was already claimed.
    #[error("transaction {0} was already consumed")]
    AlreadyConsumed(TxId),

    /// Balance arithmetic would overflow.
    #[error("balance overflow for user {0}")]
    Overflow(UserId),

    #[error("database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A stored row could not be mapped back to domain types.
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Persistent store for accounts and consumed transactions.
///
/// Every read-modify-write sequence is serialized inside the implementation;
/// callers never need an outer lock.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fetch an account, creating a zero-balance one on first contact.
    async fn get_or_create_account(&self, user_id: UserId) -> LedgerResult<Account>;

    /// Fetch an account without creating it.
    async fn account(&self, user_id: UserId) -> LedgerResult<Option<Account>>;

    async fn is_consumed(&self, tx_id: &TxId) -> LedgerResult<bool>;

    /// Atomically consume `tx_id`, credit `amount` and activate or renew the
    /// subscription when the balance reaches the price.
    ///
    /// Fails with [`LedgerError::AlreadyConsumed`] without touching any state
    /// if `tx_id` was claimed before.
    async fn credit_and_maybe_activate(
        &self,
        user_id: UserId,
        tx_id: &TxId,
        amount: Usdt,
        now: DateTime<Utc>,
    ) -> LedgerResult<CreditReceipt>;

    /// Accounts with `expiry <= now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> LedgerResult<Vec<ExpiredAccount>>;

    /// Clear the expiry of `user_id` if it still equals `observed`.
    ///
    /// Returns `false` when nothing changed (already cleared or renewed).
    async fn clear_expiry(&self, user_id: UserId, observed: DateTime<Utc>) -> LedgerResult<bool>;

    /// Transactions claimed by `user_id`, oldest first.
    async fn transactions(&self, user_id: UserId) -> LedgerResult<Vec<ConsumedTransaction>>;

    async fn summary(&self, now: DateTime<Utc>) -> LedgerResult<LedgerSummary>;

    /// Persist buffered state. Backends that write through are a no-op.
    async fn flush(&self) -> LedgerResult<()> {
        Ok(())
    }
}

/// Apply a credit to an account snapshot.
///
/// Shared by both backends so the threshold rule lives in one place.
pub(crate) fn apply_credit(
    account: &Account,
    amount: Usdt,
    now: DateTime<Utc>,
    terms: &SubscriptionTerms,
) -> LedgerResult<(Account, bool)> {
    let credited = account
        .balance
        .checked_add(amount)
        .ok_or(LedgerError::Overflow(account.user_id))?;

    let mut next = account.clone();
    next.balance = credited;

    let remainder = credited.checked_sub(terms.price);
    let activated = remainder.is_some();
    if let Some(remainder) = remainder {
        next.balance = remainder;
        let start = match account.expiry {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        next.expiry = Some(start + terms.period);
    }

    Ok((next, activated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_partial_credit_keeps_full_amount() {
        let terms = SubscriptionTerms::default();
        let account = Account::new(UserId(1));
        let (next, activated) = apply_credit(&account, Usdt::from_whole(4), now(), &terms).unwrap();
        assert!(!activated);
        assert_eq!(next.balance, Usdt::from_whole(4));
        assert_eq!(next.expiry, None);
    }

    #[test]
    fn test_crossing_credit_deducts_price() {
        let terms = SubscriptionTerms::default();
        let mut account = Account::new(UserId(1));
        account.balance = Usdt::from_whole(4);
        let (next, activated) = apply_credit(&account, Usdt::from_whole(7), now(), &terms).unwrap();
        assert!(activated);
        assert_eq!(next.balance, Usdt::from_whole(1));
        assert_eq!(next.expiry, Some(now() + Duration::days(30)));
    }

    #[test]
    fn test_renewal_extends_from_current_expiry() {
        let terms = SubscriptionTerms::default();
        let mut account = Account::new(UserId(1));
        let current = now() + Duration::days(10);
        account.expiry = Some(current);
        let (next, _) = apply_credit(&account, Usdt::from_whole(10), now(), &terms).unwrap();
        assert_eq!(next.expiry, Some(current + Duration::days(30)));
    }

    #[test]
    fn test_lapsed_expiry_restarts_from_now() {
        let terms = SubscriptionTerms::default();
        let mut account = Account::new(UserId(1));
        account.expiry = Some(now() - Duration::days(3));
        let (next, _) = apply_credit(&account, Usdt::from_whole(10), now(), &terms).unwrap();
        assert_eq!(next.expiry, Some(now() + Duration::days(30)));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let terms = SubscriptionTerms::default();
        let mut account = Account::new(UserId(1));
        account.balance = Usdt::from_micros(u64::MAX);
        let result = apply_credit(&account, Usdt::from_micros(1), now(), &terms);
        assert!(matches!(result, Err(LedgerError::Overflow(UserId(1)))));
    }

    #[test]
    fn test_account_activity() {
        let mut account = Account::new(UserId(7));
        assert!(!account.is_active(now()));
        account.expiry = Some(now());
        assert!(!account.is_active(now()));
        account.expiry = Some(now() + Duration::seconds(1));
        assert!(account.is_active(now()));
    }
}

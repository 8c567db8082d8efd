//! In-memory ledger with optional JSON snapshot persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::ledger::{
    apply_credit, Account, ConsumedTransaction, CreditReceipt, ExpiredAccount, Ledger, LedgerError,
    LedgerResult, LedgerSummary, SubscriptionTerms,
};
use crate::types::{TxId, UserId, Usdt};

/// On-disk layout of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    accounts: Vec<Account>,
    payments: Vec<ConsumedTransaction>,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<UserId, Account>,
    payments: HashMap<TxId, ConsumedTransaction>,
}

impl State {
    fn to_snapshot(&self) -> Snapshot {
        let mut accounts: Vec<_> = self.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.user_id);
        let mut payments: Vec<_> = self.payments.values().cloned().collect();
        payments.sort_by(|a, b| a.credited_at.cmp(&b.credited_at).then(a.tx_id.cmp(&b.tx_id)));
        Snapshot { accounts, payments }
    }
}

/// Ledger kept in memory behind one mutex.
///
/// The mutex is the single serialization point: the consumed-set check and
/// the credit happen under the same guard. With a persistence path every
/// mutation is written to disk before the guard is released; if the write
/// fails the mutation is undone.
pub struct MemoryLedger {
    state: Mutex<State>,
    terms: SubscriptionTerms,
    persistence_path: Option<PathBuf>,
}

impl MemoryLedger {
    /// Create an empty, non-persistent ledger.
    pub fn new(terms: SubscriptionTerms) -> Self {
        Self {
            state: Mutex::new(State::default()),
            terms,
            persistence_path: None,
        }
    }

    /// Open a ledger backed by a snapshot file, loading it if it exists.
    pub fn open(path: impl AsRef<Path>, terms: SubscriptionTerms) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = State::default();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            for account in snapshot.accounts {
                state.accounts.insert(account.user_id, account);
            }
            for payment in snapshot.payments {
                state.payments.insert(payment.tx_id.clone(), payment);
            }
            tracing::info!(
                path = %path.display(),
                accounts = state.accounts.len(),
                payments = state.payments.len(),
                "Loaded ledger snapshot"
            );
        }

        Ok(Self {
            state: Mutex::new(state),
            terms,
            persistence_path: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &State) -> LedgerResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &state.to_snapshot())?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_or_create_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let mut state = self.lock();
        if let Some(account) = state.accounts.get(&user_id) {
            return Ok(account.clone());
        }

        let account = Account::new(user_id);
        state.accounts.insert(user_id, account.clone());
        if let Err(e) = self.persist(&state) {
            state.accounts.remove(&user_id);
            return Err(e);
        }
        Ok(account)
    }

    async fn account(&self, user_id: UserId) -> LedgerResult<Option<Account>> {
        Ok(self.lock().accounts.get(&user_id).cloned())
    }

    async fn is_consumed(&self, tx_id: &TxId) -> LedgerResult<bool> {
        Ok(self.lock().payments.contains_key(tx_id))
    }

    async fn credit_and_maybe_activate(
        &self,
        user_id: UserId,
        tx_id: &TxId,
        amount: Usdt,
        now: DateTime<Utc>,
    ) -> LedgerResult<CreditReceipt> {
        let mut state = self.lock();
        if state.payments.contains_key(tx_id) {
            return Err(LedgerError::AlreadyConsumed(tx_id.clone()));
        }

        let previous = state.accounts.get(&user_id).cloned();
        let current = previous.clone().unwrap_or_else(|| Account::new(user_id));
        let (next, activated) = apply_credit(&current, amount, now, &self.terms)?;

        state.accounts.insert(user_id, next.clone());
        state.payments.insert(
            tx_id.clone(),
            ConsumedTransaction {
                tx_id: tx_id.clone(),
                user_id,
                amount,
                credited_at: now,
            },
        );

        if let Err(e) = self.persist(&state) {
            state.payments.remove(tx_id);
            match previous {
                Some(account) => state.accounts.insert(user_id, account),
                None => state.accounts.remove(&user_id),
            };
            return Err(e);
        }

        Ok(CreditReceipt {
            activated,
            balance: next.balance,
            expiry: next.expiry,
        })
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> LedgerResult<Vec<ExpiredAccount>> {
        let state = self.lock();
        let mut expired: Vec<_> = state
            .accounts
            .values()
            .filter_map(|a| match a.expiry {
                Some(expiry) if expiry <= now => Some(ExpiredAccount {
                    user_id: a.user_id,
                    expiry,
                }),
                _ => None,
            })
            .collect();
        expired.sort_by_key(|e| (e.expiry, e.user_id));
        Ok(expired)
    }

    async fn clear_expiry(&self, user_id: UserId, observed: DateTime<Utc>) -> LedgerResult<bool> {
        let mut state = self.lock();
        let Some(account) = state.accounts.get_mut(&user_id) else {
            return Ok(false);
        };
        if account.expiry != Some(observed) {
            return Ok(false);
        }
        account.expiry = None;

        if let Err(e) = self.persist(&state) {
            if let Some(account) = state.accounts.get_mut(&user_id) {
                account.expiry = Some(observed);
            }
            return Err(e);
        }
        Ok(true)
    }

    async fn transactions(&self, user_id: UserId) -> LedgerResult<Vec<ConsumedTransaction>> {
        let state = self.lock();
        let mut txs: Vec<_> = state
            .payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| a.credited_at.cmp(&b.credited_at).then(a.tx_id.cmp(&b.tx_id)));
        Ok(txs)
    }

    async fn summary(&self, now: DateTime<Utc>) -> LedgerResult<LedgerSummary> {
        let state = self.lock();
        Ok(LedgerSummary {
            accounts: state.accounts.len() as u64,
            active: state.accounts.values().filter(|a| a.is_active(now)).count() as u64,
            consumed: state.payments.len() as u64,
        })
    }

    async fn flush(&self) -> LedgerResult<()> {
        let state = self.lock();
        self.persist(&state)?;
        if let Some(path) = &self.persistence_path {
            tracing::info!(path = %path.display(), accounts = state.accounts.len(), "Saved ledger snapshot");
        }
        Ok(())
    }
}

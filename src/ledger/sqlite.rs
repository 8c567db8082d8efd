//! SQLite-backed ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::{
    apply_credit, Account, ConsumedTransaction, CreditReceipt, ExpiredAccount, Ledger, LedgerError,
    LedgerResult, LedgerSummary, SubscriptionTerms,
};
use crate::types::{TxId, UserId, Usdt};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        user_id INTEGER PRIMARY KEY,
        balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
        expiry  INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        tx_id       TEXT PRIMARY KEY,
        user_id     INTEGER NOT NULL REFERENCES accounts (user_id),
        amount      INTEGER NOT NULL,
        credited_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS accounts_expiry_idx ON accounts (expiry) WHERE expiry IS NOT NULL",
];

/// Ledger stored in SQLite.
///
/// A credit is one SQL transaction whose first statement inserts the
/// `payments` row, so the uniqueness of `tx_id` and the balance update
/// commit or roll back together.
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    terms: SubscriptionTerms,
}

impl SqliteLedger {
    /// Connect to `database_url` (e.g. `sqlite://paywall.db`) and create the
    /// schema if needed.
    pub async fn connect(database_url: &str, terms: SubscriptionTerms) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let ledger = Self { pool, terms };
        ledger.migrate().await?;
        tracing::info!(database_url = %database_url, "SQLite ledger ready");
        Ok(ledger)
    }

    async fn migrate(&self) -> LedgerResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn user_to_sql(user_id: UserId) -> LedgerResult<i64> {
    i64::try_from(user_id.0).map_err(|_| LedgerError::InvalidRecord(format!("user id {} out of range", user_id)))
}

fn amount_to_sql(amount: Usdt) -> LedgerResult<i64> {
    i64::try_from(amount.micros()).map_err(|_| LedgerError::InvalidRecord(format!("amount {} out of range", amount)))
}

fn amount_from_sql(micros: i64) -> LedgerResult<Usdt> {
    u64::try_from(micros)
        .map(Usdt::from_micros)
        .map_err(|_| LedgerError::InvalidRecord(format!("negative amount {}", micros)))
}

fn time_from_sql(secs: i64) -> LedgerResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| LedgerError::InvalidRecord(format!("timestamp {} out of range", secs)))
}

fn account_from_row(row: &SqliteRow) -> LedgerResult<Account> {
    let user_id: i64 = row.try_get("user_id")?;
    let balance: i64 = row.try_get("balance")?;
    let expiry: Option<i64> = row.try_get("expiry")?;

    Ok(Account {
        user_id: UserId(u64::try_from(user_id).map_err(|_| LedgerError::InvalidRecord(format!("user id {}", user_id)))?),
        balance: amount_from_sql(balance)?,
        expiry: expiry.map(time_from_sql).transpose()?,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn get_or_create_account(&self, user_id: UserId) -> LedgerResult<Account> {
        let uid = user_to_sql(user_id)?;
        sqlx::query("INSERT INTO accounts (user_id, balance) VALUES (?, 0) ON CONFLICT (user_id) DO NOTHING")
            .bind(uid)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT user_id, balance, expiry FROM accounts WHERE user_id = ?")
            .bind(uid)
            .fetch_one(&self.pool)
            .await?;
        account_from_row(&row)
    }

    async fn account(&self, user_id: UserId) -> LedgerResult<Option<Account>> {
        let row = sqlx::query("SELECT user_id, balance, expiry FROM accounts WHERE user_id = ?")
            .bind(user_to_sql(user_id)?)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn is_consumed(&self, tx_id: &TxId) -> LedgerResult<bool> {
        let row = sqlx::query("SELECT 1 FROM payments WHERE tx_id = ?")
            .bind(tx_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn credit_and_maybe_activate(
        &self,
        user_id: UserId,
        tx_id: &TxId,
        amount: Usdt,
        now: DateTime<Utc>,
    ) -> LedgerResult<CreditReceipt> {
        let uid = user_to_sql(user_id)?;
        let mut tx = self.pool.begin().await?;

        // Writing first takes the database write lock for the whole transaction.
        sqlx::query("INSERT INTO accounts (user_id, balance) VALUES (?, 0) ON CONFLICT (user_id) DO NOTHING")
            .bind(uid)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO payments (tx_id, user_id, amount, credited_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (tx_id) DO NOTHING",
        )
        .bind(tx_id.as_str())
        .bind(uid)
        .bind(amount_to_sql(amount)?)
        .bind(now.timestamp())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Err(LedgerError::AlreadyConsumed(tx_id.clone()));
        }

        let row = sqlx::query("SELECT user_id, balance, expiry FROM accounts WHERE user_id = ?")
            .bind(uid)
            .fetch_one(&mut *tx)
            .await?;
        let current = account_from_row(&row)?;
        let (next, activated) = apply_credit(&current, amount, now, &self.terms)?;

        sqlx::query("UPDATE accounts SET balance = ?, expiry = ? WHERE user_id = ?")
            .bind(amount_to_sql(next.balance)?)
            .bind(next.expiry.map(|e| e.timestamp()))
            .bind(uid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CreditReceipt {
            activated,
            balance: next.balance,
            expiry: next.expiry,
        })
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> LedgerResult<Vec<ExpiredAccount>> {
        let rows = sqlx::query(
            "SELECT user_id, expiry FROM accounts \
             WHERE expiry IS NOT NULL AND expiry <= ? ORDER BY expiry, user_id",
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let user_id: i64 = row.try_get("user_id")?;
                let expiry: i64 = row.try_get("expiry")?;
                Ok(ExpiredAccount {
                    user_id: UserId(u64::try_from(user_id).map_err(|_| LedgerError::InvalidRecord(format!("user id {}", user_id)))?),
                    expiry: time_from_sql(expiry)?,
                })
            })
            .collect()
    }

    async fn clear_expiry(&self, user_id: UserId, observed: DateTime<Utc>) -> LedgerResult<bool> {
        let result = sqlx::query("UPDATE accounts SET expiry = NULL WHERE user_id = ? AND expiry = ?")
            .bind(user_to_sql(user_id)?)
            .bind(observed.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transactions(&self, user_id: UserId) -> LedgerResult<Vec<ConsumedTransaction>> {
        let rows = sqlx::query(
            "SELECT tx_id, amount, credited_at FROM payments WHERE user_id = ? ORDER BY credited_at, tx_id",
        )
        .bind(user_to_sql(user_id)?)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let tx_id: String = row.try_get("tx_id")?;
                let amount: i64 = row.try_get("amount")?;
                let credited_at: i64 = row.try_get("credited_at")?;
                Ok(ConsumedTransaction {
                    tx_id: TxId::parse(&tx_id).map_err(|e| LedgerError::InvalidRecord(e.to_string()))?,
                    user_id,
                    amount: amount_from_sql(amount)?,
                    credited_at: time_from_sql(credited_at)?,
                })
            })
            .collect()
    }

    async fn summary(&self, now: DateTime<Utc>) -> LedgerResult<LedgerSummary> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM accounts) AS accounts, \
                (SELECT COUNT(*) FROM accounts WHERE expiry > ?) AS active, \
                (SELECT COUNT(*) FROM payments) AS consumed",
        )
        .bind(now.timestamp())
        .fetch_one(&self.pool)
        .await?;

        let count = |name: &str| -> LedgerResult<u64> {
            let value: i64 = row.try_get(name)?;
            Ok(value.max(0) as u64)
        };

        Ok(LedgerSummary {
            accounts: count("accounts")?,
            active: count("active")?,
            consumed: count("consumed")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()
    }

    fn tx(n: u8) -> TxId {
        TxId::parse(&format!("{:02x}", n).repeat(32)).unwrap()
    }

    async fn ledger(dir: &tempfile::TempDir) -> SqliteLedger {
        let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
        SqliteLedger::connect(&url, SubscriptionTerms::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_account_created_once() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir).await;

        assert!(ledger.account(UserId(9)).await.unwrap().is_none());
        let account = ledger.get_or_create_account(UserId(9)).await.unwrap();
        assert_eq!(account, Account::new(UserId(9)));
        ledger.get_or_create_account(UserId(9)).await.unwrap();
        assert_eq!(ledger.summary(now()).await.unwrap().accounts, 1);
    }

    #[tokio::test]
    async fn test_cumulative_credits_activate_once() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir).await;

        let first = ledger
            .credit_and_maybe_activate(UserId(1), &tx(1), Usdt::from_whole(4), now())
            .await
            .unwrap();
        assert!(!first.activated);
        assert_eq!(first.balance, Usdt::from_whole(4));

        let second = ledger
            .credit_and_maybe_activate(UserId(1), &tx(2), Usdt::from_whole(6), now())
            .await
            .unwrap();
        assert!(second.activated);
        assert_eq!(second.balance, Usdt::ZERO);
        assert_eq!(second.expiry, Some(now() + Duration::days(30)));

        let err = ledger
            .credit_and_maybe_activate(UserId(1), &tx(1), Usdt::from_whole(4), now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyConsumed(_)));

        let account = ledger.account(UserId(1)).await.unwrap().unwrap();
        assert_eq!(account.balance, Usdt::ZERO);
        assert_eq!(account.expiry, Some(now() + Duration::days(30)));
        assert_eq!(ledger.transactions(UserId(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_renewal_extends_expiry() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir).await;

        ledger
            .credit_and_maybe_activate(UserId(2), &tx(3), Usdt::from_whole(10), now())
            .await
            .unwrap();
        let renewed = ledger
            .credit_and_maybe_activate(UserId(2), &tx(4), Usdt::from_whole(10), now() + Duration::days(5))
            .await
            .unwrap();
        assert_eq!(renewed.expiry, Some(now() + Duration::days(60)));
    }

    #[tokio::test]
    async fn test_concurrent_claims_credit_once() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(ledger(&dir).await);

        let mut handles = Vec::new();
        for user in 0..8u64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .credit_and_maybe_activate(UserId(user), &tx(7), Usdt::from_whole(3), now())
                    .await
            }));
        }

        let mut credited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => credited += 1,
                Err(LedgerError::AlreadyConsumed(_)) => {}
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(credited, 1);
        assert_eq!(ledger.summary(now()).await.unwrap().consumed, 1);
    }

    #[tokio::test]
    async fn test_expiry_listing_and_clearing() {
        let dir = tempdir().unwrap();
        let ledger = ledger(&dir).await;

        ledger
            .credit_and_maybe_activate(UserId(3), &tx(5), Usdt::from_whole(10), now())
            .await
            .unwrap();
        assert!(ledger.list_expired(now()).await.unwrap().is_empty());

        let later = now() + Duration::days(30);
        let expired = ledger.list_expired(later).await.unwrap();
        assert_eq!(expired, vec![ExpiredAccount { user_id: UserId(3), expiry: later }]);

        assert!(ledger.clear_expiry(UserId(3), later).await.unwrap());
        assert!(!ledger.clear_expiry(UserId(3), later).await.unwrap());
        assert!(ledger.list_expired(later).await.unwrap().is_empty());
        assert_eq!(ledger.summary(later).await.unwrap().active, 0);
    }
}

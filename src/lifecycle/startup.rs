//! Startup helpers.

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::ledger::{Ledger, LedgerResult, MemoryLedger, SqliteLedger, SubscriptionTerms};

/// Open the configured ledger backend.
pub async fn build_ledger(storage: &StorageConfig, terms: SubscriptionTerms) -> LedgerResult<Arc<dyn Ledger>> {
    let ledger: Arc<dyn Ledger> = match storage.backend {
        StorageBackend::Sqlite => {
            Arc::new(SqliteLedger::connect(&storage.database_url, terms).await?)
        }
        StorageBackend::Memory => match &storage.snapshot_path {
            Some(path) => {
                let ledger = MemoryLedger::open(path, terms)?;
                tracing::info!(snapshot_path = %path, "Memory ledger opened");
                Arc::new(ledger)
            }
            None => {
                tracing::warn!("Memory ledger without snapshot: state is lost on restart");
                Arc::new(MemoryLedger::new(terms))
            }
        },
    };
    Ok(ledger)
}

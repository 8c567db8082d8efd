//! Resilience helpers for calls to external services.
//!
//! # Data Flow
//! ```text
//! Call to chain indexer:
//!     → tokio::time::timeout (per-attempt deadline, in the caller)
//!     → On transient failure: retries.rs (retry with backoff.rs delay)
//!     → Attempts exhausted: last error returned to the caller
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Only transient errors are retried; the caller decides which those are
//! - Jittered backoff prevents synchronized retries

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{retry_with_backoff, RetryPolicy};

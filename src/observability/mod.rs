//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (user_id, tx_id) instead of interpolated strings
//! - Secrets are never part of log fields
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

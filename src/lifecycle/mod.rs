//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Ledger backend → Verifier → Gateway → Service + Sweeper
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → tasks exit → ledger flushed → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Shutdown has a deadline: tasks still running after it are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown;
pub use startup::build_ledger;

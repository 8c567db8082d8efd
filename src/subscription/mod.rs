//! Subscription state: credits, activation and expiry.
//!
//! # Data Flow
//! ```text
//! TxId from front door
//!     → engine.rs (consumed? → verify → atomic credit → invite on activation)
//!     → Outcome
//!
//! ticker
//!     → sweep.rs (list expired → revoke → compare-and-clear → notify)
//!     → SweepReport
//! ```

pub mod clock;
pub mod engine;
pub mod notices;
pub mod outcome;
pub mod sweep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ServiceError, SubscriptionService};
pub use outcome::{InviteStatus, Outcome};
pub use sweep::{ExpirySweeper, SweepReport};

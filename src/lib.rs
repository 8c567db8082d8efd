//! Channel paywall library.
//!
//! Sells access to a private Telegram channel for USDT (TRC-20). Users send
//! the id of their transfer; it is verified against TronGrid, credited once,
//! and activates a time-boxed subscription when the balance reaches the
//! price. A periodic sweep removes members whose subscription ran out.

// Core
pub mod types;
pub mod ledger;
pub mod indexer;
pub mod subscription;

// Edges
pub mod gateway;
pub mod bot;
pub mod admin;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::PaywallConfig;
pub use lifecycle::Shutdown;
pub use subscription::{ExpirySweeper, Outcome, SubscriptionService};

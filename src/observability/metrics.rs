//! Metrics collection and exposition.
//!
//! # Metrics
//! - `paywall_submissions_total` (counter): submitted TXIDs by outcome
//! - `paywall_verifications_total` (counter): indexer lookups by result
//! - `paywall_verification_duration_seconds` (histogram): lookup latency incl. retries
//! - `paywall_activations_total` (counter): threshold crossings
//! - `paywall_invite_failures_total` (counter): activations without an invite link
//! - `paywall_sweep_accounts_total` (counter): expired accounts by sweep result
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_submission(outcome: &'static str) {
    counter!("paywall_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_verification(result: &'static str, elapsed: Duration) {
    counter!("paywall_verifications_total", "result" => result).increment(1);
    histogram!("paywall_verification_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_activation() {
    counter!("paywall_activations_total").increment(1);
}

pub fn record_invite_failure() {
    counter!("paywall_invite_failures_total").increment(1);
}

pub fn record_sweep_account(result: &'static str) {
    counter!("paywall_sweep_accounts_total", "result" => result).increment(1);
}

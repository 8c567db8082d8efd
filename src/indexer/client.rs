//! TronGrid HTTP client with timeout, retry and response checks.
//!
//! # Responsibilities
//! - Query transaction events by transaction id
//! - Bound every attempt with a deadline
//! - Retry transient failures (transport, timeout, 429, 5xx)
//! - Match the USDT transfer to the configured token contract and wallet

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

use crate::indexer::types::{
    select_transfer, AddressMatcher, EventsResponse, IndexerConfig, VerifiedTransfer, VerifyError,
};
use crate::indexer::PaymentVerifier;
use crate::observability::metrics;
use crate::resilience::{retry_with_backoff, RetryPolicy};
use crate::types::TxId;

/// Header carrying the TronGrid API key.
pub const API_KEY_HEADER: &str = "TRON-PRO-API-KEY";

/// Client for the TronGrid events API.
#[derive(Clone)]
pub struct TronGridClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    contract: AddressMatcher,
    recipient: Option<AddressMatcher>,
    only_confirmed: bool,
    timeout_duration: Duration,
    retry: RetryPolicy,
}

impl TronGridClient {
    /// Create a new client.
    ///
    /// `api_key` is sent as `TRON-PRO-API-KEY` when present.
    pub fn new(config: &IndexerConfig, api_key: Option<String>, retry: RetryPolicy) -> Result<Self, VerifyError> {
        let base_url: Url = config
            .base_url
            .parse()
            .map_err(|e| VerifyError::Transport(format!("invalid indexer URL '{}': {}", config.base_url, e)))?;

        let timeout_duration = Duration::from_secs(config.request_timeout_secs);
        let http = reqwest::Client::builder()
            .connect_timeout(timeout_duration)
            .user_agent(concat!("channel-paywall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        let contract = AddressMatcher::new(
            [config.token_contract.as_str(), config.token_contract_hex.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty()),
        );
        let recipient = config.verify_recipient.then(|| {
            AddressMatcher::new(
                [config.wallet_address.as_str(), config.wallet_address_hex.as_str()]
                    .into_iter()
                    .filter(|s| !s.is_empty()),
            )
        });

        if recipient.is_none() {
            tracing::warn!("Recipient verification disabled: transfers to any wallet will be accepted");
        }

        tracing::info!(
            base_url = %base_url,
            token_contract = %config.token_contract,
            only_confirmed = config.only_confirmed,
            timeout_secs = config.request_timeout_secs,
            max_attempts = retry.max_attempts,
            "TronGrid client initialized"
        );

        Ok(Self {
            http,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            contract,
            recipient,
            only_confirmed: config.only_confirmed,
            timeout_duration,
            retry,
        })
    }

    /// URL of the events endpoint for `tx_id`.
    pub fn events_url(&self, tx_id: &TxId) -> Result<Url, VerifyError> {
        let mut url = self
            .base_url
            .join(&format!("v1/transactions/{}/events", tx_id))
            .map_err(|e| VerifyError::Transport(e.to_string()))?;
        if self.only_confirmed {
            url.query_pairs_mut().append_pair("only_confirmed", "true");
        }
        Ok(url)
    }

    /// Fetch and decode the events of one transaction, single attempt.
    async fn fetch_events(&self, url: &Url) -> Result<EventsResponse, VerifyError> {
        let mut request = self.http.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let attempt = async {
            let response = request
                .send()
                .await
                .map_err(|e| VerifyError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(VerifyError::Status(status.as_u16()));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| VerifyError::Transport(e.to_string()))?;
            serde_json::from_slice::<EventsResponse>(&body).map_err(|e| VerifyError::Malformed(e.to_string()))
        };

        match timeout(self.timeout_duration, attempt).await {
            Ok(result) => result,
            Err(_) => Err(VerifyError::Timeout(self.timeout_duration.as_secs())),
        }
    }
}

#[async_trait]
impl PaymentVerifier for TronGridClient {
    async fn verify(&self, tx_id: &TxId) -> Result<VerifiedTransfer, VerifyError> {
        let url = self.events_url(tx_id)?;
        let url = &url;
        let started = Instant::now();

        let response = retry_with_backoff(
            &self.retry,
            |attempt| {
                tracing::debug!(tx_id = %tx_id, attempt, "Querying TronGrid");
                self.fetch_events(url)
            },
            VerifyError::is_transient,
        )
        .await;

        let result = response.and_then(|events| {
            select_transfer(&events, &self.contract, self.recipient.as_ref()).map(|(amount, recipient)| {
                VerifiedTransfer {
                    tx_id: tx_id.clone(),
                    amount,
                    recipient,
                }
            })
        });

        let label = match &result {
            Ok(_) => "verified",
            Err(e) => e.label(),
        };
        metrics::record_verification(label, started.elapsed());
        result
    }
}

impl std::fmt::Debug for TronGridClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TronGridClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("verify_recipient", &self.recipient.is_some())
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

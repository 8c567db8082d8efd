//! TronGrid response types, address matching and verifier errors.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{TxId, Usdt};

// Re-export IndexerConfig from config module to avoid duplication
pub use crate::config::schema::IndexerConfig;

/// Name of the TRC-20 transfer event.
pub const TRANSFER_EVENT: &str = "Transfer";

/// A transfer that satisfied every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedTransfer {
    pub tx_id: TxId,
    pub amount: Usdt,
    /// Recipient as reported by the indexer.
    pub recipient: Option<String>,
}

/// Why a transaction could not be verified.
///
/// Every variant degrades to "not found, try again later" for the user; the
/// distinction exists for logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Connection or protocol failure talking to the indexer.
    #[error("indexer transport error: {0}")]
    Transport(String),

    #[error("indexer request timed out after {0} seconds")]
    Timeout(u64),

    #[error("indexer returned HTTP {0}")]
    Status(u16),

    /// The indexer answered but flagged the request as unsuccessful.
    #[error("indexer reported an unsuccessful lookup")]
    Unsuccessful,

    #[error("malformed indexer response: {0}")]
    Malformed(String),

    #[error("no matching transfer event")]
    NoMatchingEvent,

    /// A token transfer exists but went to someone else.
    #[error("transfer recipient {0} is not the configured wallet")]
    RecipientMismatch(String),

    #[error("transfer amount is zero")]
    ZeroAmount,
}

impl VerifyError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            VerifyError::Transport(_) | VerifyError::Timeout(_) => true,
            VerifyError::Status(code) => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }

    /// Short label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            VerifyError::Transport(_) => "transport",
            VerifyError::Timeout(_) => "timeout",
            VerifyError::Status(_) => "status",
            VerifyError::Unsuccessful => "unsuccessful",
            VerifyError::Malformed(_) => "malformed",
            VerifyError::NoMatchingEvent => "no_matching_event",
            VerifyError::RecipientMismatch(_) => "recipient_mismatch",
            VerifyError::ZeroAmount => "zero_amount",
        }
    }
}

/// Body of `GET /v1/transactions/{id}/events`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<ContractEvent>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractEvent {
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub result: EventResult,
}

/// Decoded event arguments. TronGrid also repeats them under positional
/// keys (`"0"`, `"1"`, …), which are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventResult {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl EventResult {
    /// Raw token value (micro-USDT), accepting a decimal string or a number.
    pub fn raw_value(&self) -> Result<u64, VerifyError> {
        match &self.value {
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| VerifyError::Malformed(format!("transfer value '{}'", s))),
            Some(serde_json::Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| VerifyError::Malformed(format!("transfer value {}", n))),
            Some(other) => Err(VerifyError::Malformed(format!("transfer value {}", other))),
            None => Err(VerifyError::Malformed("transfer value missing".to_string())),
        }
    }
}

/// Normalized spelling of a Tron address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressForm {
    /// `T…` base58check string, compared verbatim.
    Base58(String),
    /// The 20 account bytes as lowercase hex, without `0x`/`41` prefix.
    Hex(String),
    Unknown,
}

impl AddressForm {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() == 34 && raw.starts_with('T') {
            return AddressForm::Base58(raw.to_string());
        }

        let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")).unwrap_or(raw);
        let hex = hex.to_ascii_lowercase();
        let hex = match hex.len() {
            42 if hex.starts_with("41") => hex[2..].to_string(),
            40 => hex,
            _ => return AddressForm::Unknown,
        };
        if hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            AddressForm::Hex(hex)
        } else {
            AddressForm::Unknown
        }
    }
}

/// An address known in both spellings the indexer may use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMatcher {
    base58: Option<String>,
    hex: Option<String>,
}

impl AddressMatcher {
    /// Build from any combination of base58 and hex spellings.
    pub fn new<'a>(spellings: impl IntoIterator<Item = &'a str>) -> Self {
        let mut matcher = Self::default();
        for spelling in spellings {
            match AddressForm::parse(spelling) {
                AddressForm::Base58(b) => matcher.base58 = Some(b),
                AddressForm::Hex(h) => matcher.hex = Some(h),
                AddressForm::Unknown => {}
            }
        }
        matcher
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match AddressForm::parse(candidate) {
            AddressForm::Base58(b) => self.base58.as_deref() == Some(b.as_str()),
            AddressForm::Hex(h) => self.hex.as_deref() == Some(h.as_str()),
            AddressForm::Unknown => false,
        }
    }
}

/// Find the first qualifying transfer in an indexer response.
///
/// `recipient` of `None` disables the destination check.
pub fn select_transfer(
    response: &EventsResponse,
    contract: &AddressMatcher,
    recipient: Option<&AddressMatcher>,
) -> Result<(Usdt, Option<String>), VerifyError> {
    if !response.success {
        return Err(VerifyError::Unsuccessful);
    }

    let events = response.data.as_deref().unwrap_or_default();
    let mut rejection = VerifyError::NoMatchingEvent;

    for event in events {
        if event.event_name != TRANSFER_EVENT || !contract.matches(&event.contract_address) {
            continue;
        }

        if let Some(wallet) = recipient {
            let to = event.result.to.as_deref().unwrap_or_default();
            if !wallet.matches(to) {
                rejection = VerifyError::RecipientMismatch(to.to_string());
                continue;
            }
        }

        let raw = event.result.raw_value()?;
        if raw == 0 {
            rejection = VerifyError::ZeroAmount;
            continue;
        }
        return Ok((Usdt::from_micros(raw), event.result.to.clone()));
    }

    Err(rejection)
}

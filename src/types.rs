//! Domain identifiers and the USDT amount type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places used by the USDT TRC-20 contract.
pub const USDT_DECIMALS: u32 = 6;

const MICROS_PER_USDT: u64 = 10u64.pow(USDT_DECIMALS);

/// Length of a Tron transaction id in hex characters.
pub const TX_ID_LEN: usize = 64;

/// Stable identifier of a person (Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Telegram chat id of the paid channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors produced while parsing user supplied values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("transaction id must be 64 characters, got {0}")]
    TxIdLength(usize),

    #[error("transaction id must be hexadecimal")]
    TxIdCharset,

    #[error("invalid USDT amount '{0}'")]
    Amount(String),

    #[error("USDT amount '{0}' has more than 6 decimal places")]
    AmountPrecision(String),
}

/// A Tron transaction id, normalized to lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    /// Parse a user supplied transaction id.
    ///
    /// Surrounding whitespace is ignored and the result is lowercased so that
    /// `ABC…` and `abc…` refer to the same consumed transaction.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        if trimmed.len() != TX_ID_LEN {
            return Err(ParseError::TxIdLength(trimmed.chars().count()));
        }
        if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseError::TxIdCharset);
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TxId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A non-negative USDT amount in micro-units (1 USDT = 1_000_000).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "String")]
pub struct Usdt(u64);

impl Usdt {
    pub const ZERO: Usdt = Usdt(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Whole USDT, mostly for tests and defaults.
    pub const fn from_whole(units: u64) -> Self {
        Self(units * MICROS_PER_USDT)
    }

    pub const fn micros(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Usdt) -> Option<Usdt> {
        self.0.checked_add(other.0).map(Usdt)
    }

    pub fn checked_sub(self, other: Usdt) -> Option<Usdt> {
        self.0.checked_sub(other.0).map(Usdt)
    }

    pub fn saturating_sub(self, other: Usdt) -> Usdt {
        Usdt(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Usdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / MICROS_PER_USDT;
        let frac = self.0 % MICROS_PER_USDT;
        let digits = format!("{:06}", frac);
        let trimmed = digits.trim_end_matches('0');
        if trimmed.len() <= 2 {
            write!(f, "{}.{:0<2}", whole, trimmed)
        } else {
            write!(f, "{}.{}", whole, trimmed)
        }
    }
}

impl FromStr for Usdt {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseError::Amount(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > USDT_DECIMALS as usize {
            return Err(ParseError::AmountPrecision(s.to_string()));
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let frac_micros: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = USDT_DECIMALS as usize);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(MICROS_PER_USDT)
            .and_then(|w| w.checked_add(frac_micros))
            .map(Usdt)
            .ok_or_else(invalid)
    }
}

/// Accepted config/JSON spellings of an amount: `10`, `"10.5"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Integer(u64),
    Text(String),
}

impl TryFrom<AmountRepr> for Usdt {
    type Error = ParseError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Integer(units) => units
                .checked_mul(MICROS_PER_USDT)
                .map(Usdt)
                .ok_or_else(|| ParseError::Amount(units.to_string())),
            AmountRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Usdt> for String {
    fn from(amount: Usdt) -> Self {
        amount.to_string()
    }
}

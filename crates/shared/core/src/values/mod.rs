use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidAsset;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Balance or order amount - uses Decimal for precision
pub type Amount = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Per-account journal position, starting at 1
pub type SequenceNumber = u64;

/// Asset ticker, normalised to upper case ("BTC", "USD")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset(String);

impl Asset {
    /// Ticker of the quote currency every pair is priced in
    pub const QUOTE: &'static str = "USD";

    pub fn new(symbol: impl AsRef<str>) -> Result<Self, InvalidAsset> {
        let symbol = symbol.as_ref().trim();
        let valid = !symbol.is_empty()
            && symbol.len() <= 10
            && symbol.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid {
            return Err(InvalidAsset(symbol.to_string()));
        }
        Ok(Self(symbol.to_ascii_uppercase()))
    }

    /// The quote currency
    pub fn usd() -> Self {
        Self(Self::QUOTE.to_string())
    }

    /// Built-in tickers, already upper case
    pub(crate) fn known(symbol: &'static str) -> Self {
        Self(symbol.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Asset {
    type Err = InvalidAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Asset {
    type Error = InvalidAsset;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.0
    }
}

/// Account identifier as issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Idempotency key shared by every entry one business operation produces
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Joins a parent id and a suffix in system-derived ids
    pub const DERIVED_SEPARATOR: char = ':';

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random correlation id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Correlation id of a follow-up operation, e.g. `<id>:reversal`
    pub fn derive(&self, suffix: &str) -> Self {
        Self(format!("{}{}{}", self.0, Self::DERIVED_SEPARATOR, suffix))
    }

    /// Ids carrying the separator belong to the system; clients may not supply them
    pub fn is_derived(&self) -> bool {
        self.0.contains(Self::DERIVED_SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

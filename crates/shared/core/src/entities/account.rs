use serde::{Deserialize, Serialize};

use crate::values::Amount;
use rust_decimal::Decimal;

/// Account lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Open,
    /// Terminal: every balance was zero when the account closed
    Closed,
}

/// Balance for a single asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    /// Free to trade or withdraw
    pub available: Amount,
    /// Held by an outstanding reservation
    pub reserved: Amount,
}

impl AssetBalance {
    pub fn new(available: Amount, reserved: Amount) -> Self {
        Self {
            available,
            reserved,
        }
    }

    pub fn total(&self) -> Amount {
        self.available + self.reserved
    }

    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.reserved.is_zero()
    }

    /// Neither side may ever be negative
    pub fn is_consistent(&self) -> bool {
        self.available >= Decimal::ZERO && self.reserved >= Decimal::ZERO
    }
}

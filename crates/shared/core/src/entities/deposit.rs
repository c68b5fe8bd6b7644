use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::values::Amount;

/// Funding channel of a confirmed deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositMethod {
    /// On-chain transfer; network fees are paid by the sender
    Crypto,
    /// Wire transfer, flat 5 USD
    Bank,
    /// Debit or credit card, 3.5 %
    Card,
}

impl DepositMethod {
    pub const BANK_FEE: Decimal = dec!(5);
    pub const CARD_FEE_RATE: Decimal = dec!(0.035);
    /// Network confirmations before a crypto deposit is credited
    pub const REQUIRED_CONFIRMATIONS: u32 = 3;

    /// Fee withheld from a deposit of `amount`
    pub fn fee(&self, amount: Amount) -> Amount {
        match self {
            DepositMethod::Crypto => Decimal::ZERO,
            DepositMethod::Bank => Self::BANK_FEE,
            DepositMethod::Card => amount * Self::CARD_FEE_RATE,
        }
    }

    /// Fiat channels fund the quote asset only
    pub fn is_fiat(&self) -> bool {
        !matches!(self, DepositMethod::Crypto)
    }
}

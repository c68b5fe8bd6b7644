use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, Side};
use crate::values::{AccountId, Amount, Asset, Price, Timestamp};

/// Unique identifier for a trade
pub type TradeId = Uuid;

/// Full fill of one order against the reference price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: TradeId,
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub symbol: Asset,
    pub side: Side,
    pub executed_price: Price,
    pub executed_amount: Amount,
    /// Charged in the quote asset
    pub fee_amount: Amount,
    pub timestamp: Timestamp,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        account_id: AccountId,
        symbol: Asset,
        side: Side,
        executed_price: Price,
        executed_amount: Amount,
        fee_amount: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            account_id,
            symbol,
            side,
            executed_price,
            executed_amount,
            fee_amount,
            timestamp,
        }
    }

    /// Returns the notional value of the trade (price * amount)
    pub fn notional(&self) -> Amount {
        self.executed_price * self.executed_amount
    }

    /// Quote asset moved by the fill: paid for a buy, received for a sell
    pub fn quote_delta(&self) -> Amount {
        match self.side {
            Side::Buy => -(self.notional() + self.fee_amount),
            Side::Sell => self.notional() - self.fee_amount,
        }
    }
}

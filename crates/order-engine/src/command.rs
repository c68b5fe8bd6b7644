use coinvault_core::{Amount, Asset, Order, OrderKind, Price, Side, Trade};

#[derive(Debug, Clone)]
pub struct SubmitOrderCommand {
    pub symbol: Asset,
    pub side: Side,
    pub kind: OrderKind,
    pub amount: Amount,
    pub limit_price: Option<Price>,
    /// Idempotency key chosen by the client
    pub client_order_id: Option<String>,
}

impl SubmitOrderCommand {
    pub fn market(symbol: Asset, side: Side, amount: Amount) -> Self {
        Self {
            symbol,
            side,
            kind: OrderKind::Market,
            amount,
            limit_price: None,
            client_order_id: None,
        }
    }

    pub fn limit(symbol: Asset, side: Side, amount: Amount, limit_price: Price) -> Self {
        Self {
            symbol,
            side,
            kind: OrderKind::Limit,
            amount,
            limit_price: Some(limit_price),
            client_order_id: None,
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOrderResult {
    pub order: Order,
    pub trade: Option<Trade>,
    /// True when the order already existed under the same idempotency key
    pub replayed: bool,
}

/// Symbol pair the engine quotes, e.g. BTC/USD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingPair {
    pub base: Asset,
    pub quote: Asset,
}

impl TradingPair {
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, Side};
use crate::error::TransitionError;
use crate::values::{AccountId, Amount, Asset, CorrelationId, Price, Timestamp};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// How the execution price is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Execute at the reference price, whatever it is
    Market,
    /// Execute at the reference price only if it is at or better than the limit
    Limit,
}

/// Business rule that refused an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientFunds,
    InsufficientHoldings,
    PriceNotMet,
    StalePrice,
    PriceUnavailable,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::InsufficientFunds => "InsufficientFunds",
            RejectReason::InsufficientHoldings => "InsufficientHoldings",
            RejectReason::PriceNotMet => "PriceNotMet",
            RejectReason::StalePrice => "StalePrice",
            RejectReason::PriceUnavailable => "PriceUnavailable",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Buy or sell request against the reference price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    /// Base asset being bought or sold
    pub symbol: Asset,
    pub side: Side,
    pub kind: OrderKind,
    pub amount: Amount,
    pub limit_price: Option<Price>,
    pub status: OrderStatus,
    pub rejection: Option<RejectReason>,
    pub correlation_id: CorrelationId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Create a pending order
    ///
    /// Without a client-supplied correlation id the order id doubles as one.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        symbol: Asset,
        side: Side,
        kind: OrderKind,
        amount: Amount,
        limit_price: Option<Price>,
        correlation_id: Option<CorrelationId>,
        now: Timestamp,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            account_id,
            symbol,
            side,
            kind,
            amount,
            limit_price,
            status: OrderStatus::Pending,
            rejection: None,
            correlation_id: correlation_id.unwrap_or_else(|| CorrelationId::from(id)),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `reference` is an acceptable execution price for this order
    pub fn accepts_price(&self, reference: Price) -> bool {
        match (self.kind, self.limit_price) {
            (OrderKind::Market, _) | (OrderKind::Limit, None) => true,
            (OrderKind::Limit, Some(limit)) => match self.side {
                Side::Buy => reference <= limit,
                Side::Sell => reference >= limit,
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn fill(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Filled, now)
    }

    pub fn reject(&mut self, reason: RejectReason, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Rejected, now)?;
        self.rejection = Some(reason);
        Ok(())
    }

    pub fn cancel(&mut self, now: Timestamp) -> Result<(), TransitionError> {
        self.transition(OrderStatus::Cancelled, now)
    }

    fn transition(&mut self, to: OrderStatus, now: Timestamp) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError {
                entity: "order",
                from: self.status.to_string(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

use serde::{Deserialize, Serialize};

use crate::values::{Amount, Asset, Price};

/// Derived position in one asset; never stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: Asset,
    /// available + reserved
    pub amount: Amount,
    pub price: Price,
    pub current_value: Amount,
    /// Average-cost basis of the amount held
    pub cost_basis: Amount,
    /// Share of the portfolio value, in percent
    pub percentage: Amount,
    pub unrealized_change: Amount,
}

/// Account-level performance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_value: Amount,
    /// External money in minus money out
    pub net_contributions: Amount,
    pub total_change: Amount,
    pub total_change_percent: Amount,
}

use std::sync::Arc;

use chrono::Duration;
use coinvault_core::{AccountId, Amount, Asset, Holding, PortfolioStats, Price};
use coinvault_ledger::AccountLedger;
use coinvault_ports::MarketDataProvider;
use log::{debug, warn};
use rust_decimal::Decimal;

use crate::cost_basis::CostBasis;
use crate::error::{Result, ValuationError};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
/// Percentages are reported to two decimal places
const PERCENT_DP: u32 = 2;

#[derive(Debug, Clone)]
pub struct ValuationConfig {
    pub quote: Asset,
    pub max_price_age: Duration,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            quote: Asset::usd(),
            max_price_age: Duration::seconds(30),
        }
    }
}

/// Holdings and stats computed from one journal replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Valuation {
    pub holdings: Vec<Holding>,
    pub stats: PortfolioStats,
}

pub struct PortfolioValuator {
    ledger: Arc<AccountLedger>,
    market_data: Arc<dyn MarketDataProvider>,
    config: ValuationConfig,
}

impl PortfolioValuator {
    pub fn new(ledger: Arc<AccountLedger>, market_data: Arc<dyn MarketDataProvider>, config: ValuationConfig) -> Self {
        Self {
            ledger,
            market_data,
            config,
        }
    }

    /// Priced holdings, largest position first
    pub async fn holdings(&self, account_id: &AccountId) -> Result<Vec<Holding>> {
        Ok(self.valuation(account_id).await?.holdings)
    }

    pub async fn stats(&self, account_id: &AccountId) -> Result<PortfolioStats> {
        Ok(self.valuation(account_id).await?.stats)
    }

    pub async fn valuation(&self, account_id: &AccountId) -> Result<Valuation> {
        let basis = CostBasis::from_entries(self.config.quote.clone(), self.ledger.journal().replay(account_id));

        let mut holdings = Vec::new();
        for (asset, position) in basis.positions() {
            let price = self.price(asset).await?;
            let current_value = position.quantity * price;
            holdings.push(Holding {
                symbol: asset.clone(),
                amount: position.quantity,
                price,
                current_value,
                cost_basis: position.cost,
                percentage: Decimal::ZERO,
                unrealized_change: current_value - position.cost,
            });
        }

        let total_value: Amount = holdings.iter().map(|h| h.current_value).sum();
        if !total_value.is_zero() {
            for holding in &mut holdings {
                holding.percentage = (holding.current_value / total_value * HUNDRED).round_dp(PERCENT_DP);
            }
        }
        holdings.sort_by(|a, b| b.current_value.cmp(&a.current_value).then(a.symbol.cmp(&b.symbol)));

        let net_contributions = basis.net_contributions();
        let total_change = total_value - net_contributions;
        let total_change_percent = if net_contributions > Decimal::ZERO {
            (total_change / net_contributions * HUNDRED).round_dp(PERCENT_DP)
        } else {
            Decimal::ZERO
        };

        debug!("Valued {} at {} across {} holdings", account_id, total_value, holdings.len());
        Ok(Valuation {
            holdings,
            stats: PortfolioStats {
                total_value,
                net_contributions,
                total_change,
                total_change_percent,
            },
        })
    }

    async fn price(&self, asset: &Asset) -> Result<Price> {
        if asset == &self.config.quote {
            return Ok(Decimal::ONE);
        }

        let quote = self
            .market_data
            .reference_price(asset)
            .await
            .map_err(|e| ValuationError::PriceUnavailable {
                symbol: asset.clone(),
                reason: e.to_string(),
            })?;
        if quote.price <= Decimal::ZERO {
            return Err(ValuationError::PriceUnavailable {
                symbol: asset.clone(),
                reason: format!("non-positive price {}", quote.price),
            });
        }
        if quote.is_stale(self.ledger.clock().now(), self.config.max_price_age) {
            warn!("Refusing stale {} price from {}", asset, self.market_data.name());
            return Err(ValuationError::StalePrice {
                symbol: asset.clone(),
                as_of: quote.as_of,
            });
        }
        Ok(quote.price)
    }
}

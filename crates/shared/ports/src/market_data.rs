use async_trait::async_trait;
use chrono::Duration;
use coinvault_core::{Asset, Price, Timestamp};

use crate::error::MarketDataResult;

/// Reference price for one symbol, quoted in the quote asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub symbol: Asset,
    pub price: Price,
    /// When the provider observed the price
    pub as_of: Timestamp,
}

impl PriceQuote {
    /// How far ahead of the local clock a provider timestamp may run
    pub const MAX_CLOCK_SKEW_SECS: i64 = 5;

    pub fn new(symbol: Asset, price: Price, as_of: Timestamp) -> Self {
        Self {
            symbol,
            price,
            as_of,
        }
    }

    /// Age of the quote relative to `now`
    pub fn age(&self, now: Timestamp) -> Duration {
        now - self.as_of
    }

    /// A quote is stale once it is older than `max_age`
    ///
    /// A quote stamped beyond the allowed skew in the future is unusable too.
    pub fn is_stale(&self, now: Timestamp, max_age: Duration) -> bool {
        let age = self.age(now);
        age > max_age || -age > Duration::seconds(Self::MAX_CLOCK_SKEW_SECS)
    }
}

/// Port for reference prices
///
/// Implementations must report failures instead of substituting values;
/// callers decide whether a fixture is acceptable.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn reference_price(&self, symbol: &Asset) -> MarketDataResult<PriceQuote>;

    fn name(&self) -> &str {
        "MarketDataProvider"
    }
}

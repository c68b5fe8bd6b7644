//! Fixture Price Feed
//!
//! A fixed table of reference prices. Quotes are stamped with the clock's
//! current time unless pinned to an explicit observation time, so tests can
//! produce stale quotes on purpose.
//!
//! Default table (USD):
//!
//! | Symbol | Price |
//! |--------|-------|
//! | BTC    | 40000 |
//! | ETH    | 2500  |
//! | USDT   | 1     |
//! | BNB    | 300   |

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use coinvault_core::{Asset, Price, Timestamp};
use coinvault_ports::{Clock, MarketDataError, MarketDataProvider, MarketDataResult, PriceQuote};
use parking_lot::RwLock;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy)]
struct Fixture {
    price: Price,
    /// None = always fresh
    as_of: Option<Timestamp>,
}

pub struct FixturePriceFeed {
    clock: Arc<dyn Clock>,
    prices: RwLock<HashMap<Asset, Fixture>>,
    unavailable: AtomicBool,
}

impl FixturePriceFeed {
    /// Empty feed; every lookup fails until prices are set
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            prices: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Feed loaded with the default table
    pub fn standard(clock: Arc<dyn Clock>) -> Self {
        let feed = Self::new(clock);
        for (symbol, price) in [("BTC", 40000), ("ETH", 2500), ("USDT", 1), ("BNB", 300)] {
            if let Ok(asset) = Asset::new(symbol) {
                feed.set_price(asset, Decimal::from(price));
            }
        }
        feed
    }

    pub fn with_price(self, symbol: Asset, price: Price) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Fresh quote: stamped with the clock at lookup time
    pub fn set_price(&self, symbol: Asset, price: Price) {
        self.prices.write().insert(symbol, Fixture { price, as_of: None });
    }

    /// Pinned quote: keeps `as_of` regardless of the clock
    pub fn set_quote(&self, symbol: Asset, price: Price, as_of: Timestamp) {
        self.prices.write().insert(
            symbol,
            Fixture {
                price,
                as_of: Some(as_of),
            },
        );
    }

    pub fn remove(&self, symbol: &Asset) {
        self.prices.write().remove(symbol);
    }

    /// Simulate an outage: every lookup fails with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketDataProvider for FixturePriceFeed {
    async fn reference_price(&self, symbol: &Asset) -> MarketDataResult<PriceQuote> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MarketDataError::Unavailable("fixture feed switched off".to_string()));
        }
        let fixture = self
            .prices
            .read()
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.clone()))?;

        let as_of = fixture.as_of.unwrap_or_else(|| self.clock.now());
        Ok(PriceQuote::new(symbol.clone(), fixture.price, as_of))
    }

    fn name(&self) -> &str {
        "FixturePriceFeed"
    }
}

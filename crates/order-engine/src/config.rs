use chrono::Duration;
use coinvault_core::AssetRegistry;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Supported assets; the registry's quote asset prices every pair
    pub assets: AssetRegistry,
    /// Fraction of notional charged per fill, in the quote asset
    pub fee_rate: Decimal,
    /// Quotes older than this reject the order with StalePrice
    pub max_price_age: Duration,
}

impl EngineConfig {
    pub const DEFAULT_FEE_RATE: Decimal = dec!(0.001);
    pub const DEFAULT_MAX_PRICE_AGE_SECS: i64 = 30;

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_max_price_age(mut self, max_price_age: Duration) -> Self {
        self.max_price_age = max_price_age;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assets: AssetRegistry::standard(),
            fee_rate: Self::DEFAULT_FEE_RATE,
            max_price_age: Duration::seconds(Self::DEFAULT_MAX_PRICE_AGE_SECS),
        }
    }
}

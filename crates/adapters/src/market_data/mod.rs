mod coingecko;
mod fixture;

pub use coingecko::CoinGeckoPriceFeed;
pub use fixture::FixturePriceFeed;

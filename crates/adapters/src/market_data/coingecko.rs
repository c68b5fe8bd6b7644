use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use coinvault_core::{Asset, Price};
use coinvault_ports::{MarketDataError, MarketDataProvider, MarketDataResult, PriceQuote};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

/// Live USD prices from CoinGecko's `/simple/price` endpoint
///
/// The quote's `as_of` is CoinGecko's `last_updated_at`, so the engine's
/// staleness bound applies to the provider's observation time rather than
/// the time of the request.
#[derive(Clone)]
pub struct CoinGeckoPriceFeed {
    client: Client,
    base_url: String,
    /// Our symbol -> CoinGecko coin id
    coin_ids: HashMap<Asset, String>,
}

impl CoinGeckoPriceFeed {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.coingecko.com/api/v3";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>) -> MarketDataResult<Self> {
        let client = Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MarketDataError::Unavailable(e.to_string()))?;

        let mut coin_ids = HashMap::new();
        for (symbol, id) in [
            ("BTC", "bitcoin"),
            ("ETH", "ethereum"),
            ("USDT", "tether"),
            ("BNB", "binancecoin"),
        ] {
            if let Ok(asset) = Asset::new(symbol) {
                coin_ids.insert(asset, id.to_string());
            }
        }

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            coin_ids,
        })
    }

    /// Map an additional symbol to a CoinGecko coin id
    pub fn with_coin(mut self, symbol: Asset, coin_id: impl Into<String>) -> Self {
        self.coin_ids.insert(symbol, coin_id.into());
        self
    }

    fn coin_id(&self, symbol: &Asset) -> MarketDataResult<&str> {
        self.coin_ids
            .get(symbol)
            .map(String::as_str)
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.clone()))
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoPriceFeed {
    async fn reference_price(&self, symbol: &Asset) -> MarketDataResult<PriceQuote> {
        let coin_id = self.coin_id(symbol)?;
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_last_updated_at=true",
            self.base_url, coin_id
        );
        debug!("GET {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::Unavailable(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| MarketDataError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            warn!("CoinGecko returned HTTP {} for {}", status, symbol);
            return Err(MarketDataError::Unavailable(format!("HTTP {}: {}", status, text)));
        }

        parse_simple_price(&text, symbol, coin_id)
    }

    fn name(&self) -> &str {
        "CoinGeckoPriceFeed"
    }
}

/// Parse `{"bitcoin":{"usd":40000.5,"last_updated_at":1700000000}}`
pub(crate) fn parse_simple_price(body: &str, symbol: &Asset, coin_id: &str) -> MarketDataResult<PriceQuote> {
    let json: Value = serde_json::from_str(body).map_err(|e| MarketDataError::Malformed(e.to_string()))?;
    let coin = json
        .get(coin_id)
        .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.clone()))?;

    // Go through the textual form so the decimal keeps the digits CoinGecko sent
    let price: Price = match coin.get("usd") {
        Some(Value::Number(n)) => {
            Decimal::from_str(&n.to_string()).or_else(|_| Decimal::from_scientific(&n.to_string()))
        }
        Some(Value::String(s)) => Decimal::from_str(s),
        _ => return Err(MarketDataError::Malformed(format!("no usd price for {coin_id}"))),
    }
    .map_err(|e| MarketDataError::Malformed(e.to_string()))?;

    let as_of = coin
        .get("last_updated_at")
        .and_then(Value::as_i64)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| MarketDataError::Malformed(format!("no last_updated_at for {coin_id}")))?;

    Ok(PriceQuote::new(symbol.clone(), price, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Asset {
        Asset::new("BTC").unwrap()
    }

    #[test]
    fn test_parse_simple_price() {
        let body = r#"{"bitcoin":{"usd":40123.45,"last_updated_at":1700000000}}"#;
        let quote = parse_simple_price(body, &btc(), "bitcoin").unwrap();

        assert_eq!(quote.price, dec!(40123.45));
        assert_eq!(quote.as_of.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_missing_coin() {
        let err = parse_simple_price("{}", &btc(), "bitcoin").unwrap_err();
        assert_eq!(err, MarketDataError::UnknownSymbol(btc()));
    }

    #[test]
    fn test_parse_missing_timestamp_is_malformed() {
        let body = r#"{"bitcoin":{"usd":40000}}"#;
        assert!(matches!(
            parse_simple_price(body, &btc(), "bitcoin"),
            Err(MarketDataError::Malformed(_))
        ));
    }

    #[test]
    fn test_unmapped_symbol() {
        let feed = CoinGeckoPriceFeed::new(CoinGeckoPriceFeed::DEFAULT_BASE_URL).unwrap();
        let doge = Asset::new("DOGE").unwrap();
        assert!(feed.coin_id(&doge).is_err());

        let feed = feed.with_coin(doge.clone(), "dogecoin");
        assert_eq!(feed.coin_id(&doge).unwrap(), "dogecoin");
    }
}

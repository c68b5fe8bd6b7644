use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::values::{Amount, Asset};

/// How a withdrawal of this asset leaves the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutKind {
    Crypto,
    Bank,
}

/// Withdrawal parameters for one supported asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSpec {
    pub asset: Asset,
    pub name: String,
    pub network: String,
    pub payout: PayoutKind,
    pub min_withdraw: Amount,
    /// Flat fee per withdrawal, in the asset itself
    pub withdraw_fee: Amount,
}

impl AssetSpec {
    pub fn crypto(
        asset: Asset,
        name: impl Into<String>,
        network: impl Into<String>,
        min_withdraw: Amount,
        withdraw_fee: Amount,
    ) -> Self {
        Self {
            asset,
            name: name.into(),
            network: network.into(),
            payout: PayoutKind::Crypto,
            min_withdraw,
            withdraw_fee,
        }
    }

    pub fn bank(asset: Asset, name: impl Into<String>, min_withdraw: Amount, withdraw_fee: Amount) -> Self {
        Self {
            asset,
            name: name.into(),
            network: "Bank Transfer".to_string(),
            payout: PayoutKind::Bank,
            min_withdraw,
            withdraw_fee,
        }
    }
}

/// The set of assets the platform knows, keyed by ticker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRegistry {
    quote: Asset,
    specs: BTreeMap<Asset, AssetSpec>,
}

impl AssetRegistry {
    pub fn new(quote: Asset, specs: impl IntoIterator<Item = AssetSpec>) -> Self {
        Self {
            quote,
            specs: specs.into_iter().map(|s| (s.asset.clone(), s)).collect(),
        }
    }

    /// Bitcoin, Ether, Tether and BNB plus USD bank payouts
    pub fn standard() -> Self {
        let asset = Asset::known;
        Self::new(
            Asset::usd(),
            [
                AssetSpec::crypto(asset("BTC"), "Bitcoin", "Bitcoin", dec!(0.001), dec!(0.0005)),
                AssetSpec::crypto(asset("ETH"), "Ethereum", "Ethereum", dec!(0.01), dec!(0.005)),
                AssetSpec::crypto(asset("USDT"), "Tether", "Ethereum (ERC-20)", dec!(10), dec!(1)),
                AssetSpec::crypto(asset("BNB"), "BNB", "BSC", dec!(0.1), dec!(0.01)),
                AssetSpec::bank(Asset::usd(), "US Dollar", dec!(20), dec!(10)),
            ],
        )
    }

    pub fn quote(&self) -> &Asset {
        &self.quote
    }

    pub fn get(&self, asset: &Asset) -> Option<&AssetSpec> {
        self.specs.get(asset)
    }

    pub fn is_supported(&self, asset: &Asset) -> bool {
        self.specs.contains_key(asset)
    }

    /// Assets that can be bought and sold against the quote asset
    pub fn tradable(&self) -> impl Iterator<Item = &Asset> {
        self.specs.keys().filter(move |a| **a != self.quote)
    }

    pub fn specs(&self) -> impl Iterator<Item = &AssetSpec> {
        self.specs.values()
    }

    pub fn min_withdraw(&self, asset: &Asset) -> Amount {
        self.get(asset).map(|s| s.min_withdraw).unwrap_or(Decimal::ZERO)
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

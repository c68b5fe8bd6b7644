use std::collections::BTreeMap;

use coinvault_core::{Amount, Asset, EntryReason, LedgerEntry, Price};
use rust_decimal::Decimal;

/// Quantity held and what it cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub quantity: Amount,
    /// Total cost of `quantity`, in the quote asset
    pub cost: Amount,
    /// Average cost last seen while the position was open
    last_average: Price,
}

impl Position {
    pub fn average_cost(&self) -> Price {
        if self.quantity.is_zero() {
            self.last_average
        } else {
            self.cost / self.quantity
        }
    }

    fn increase(&mut self, quantity: Amount, cost: Amount) {
        self.quantity += quantity;
        self.cost += cost;
        if !self.quantity.is_zero() {
            self.last_average = self.cost / self.quantity;
        }
    }

    /// Remove `quantity` at the average cost; returns the cost removed
    fn decrease(&mut self, quantity: Amount) -> Amount {
        let average = self.average_cost();
        let removed = if quantity >= self.quantity {
            self.cost
        } else {
            quantity * average
        };
        self.quantity -= quantity;
        self.cost -= removed;
        if self.quantity <= Decimal::ZERO {
            self.cost = Decimal::ZERO;
        }
        self.last_average = average;
        removed
    }
}

/// Average-cost fold over one account's journal
///
/// The quote asset always costs 1. Increases carrying a price cost
/// `delta * price`; increases without one (reversals, manual entries) come in
/// at the running average. Decreases leave at the average.
#[derive(Debug, Clone)]
pub struct CostBasis {
    quote: Asset,
    positions: BTreeMap<Asset, Position>,
    net_contributions: Amount,
}

impl CostBasis {
    pub fn new(quote: Asset) -> Self {
        Self {
            quote,
            positions: BTreeMap::new(),
            net_contributions: Decimal::ZERO,
        }
    }

    /// Entries must be in sequence order
    pub fn from_entries(quote: Asset, entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        let mut basis = Self::new(quote);
        for entry in entries {
            basis.apply(&entry);
        }
        basis
    }

    pub fn apply(&mut self, entry: &LedgerEntry) {
        if entry.reason == EntryReason::AccountClosure || entry.delta.is_zero() {
            return;
        }

        let is_quote = entry.asset == self.quote;
        let position = self.positions.entry(entry.asset.clone()).or_default();

        let value = if entry.delta.is_sign_positive() {
            let unit_cost = match (is_quote, entry.price) {
                (true, _) => Decimal::ONE,
                (false, Some(price)) => price,
                (false, None) => position.average_cost(),
            };
            let cost = entry.delta * unit_cost;
            position.increase(entry.delta, cost);
            cost
        } else {
            let removed = position.decrease(-entry.delta);
            // A priced exit (a sale) is worth what it fetched, not what it cost
            match (is_quote, entry.price, entry.reason.is_external()) {
                (false, Some(price), true) => -entry.delta * price,
                _ => removed,
            }
        };

        if entry.reason.is_external() {
            if entry.delta.is_sign_positive() {
                self.net_contributions += value;
            } else {
                self.net_contributions -= value;
            }
        }
    }

    pub fn position(&self, asset: &Asset) -> Position {
        self.positions.get(asset).copied().unwrap_or_default()
    }

    /// Open positions, by symbol
    pub fn positions(&self) -> impl Iterator<Item = (&Asset, &Position)> {
        self.positions.iter().filter(|(_, p)| !p.quantity.is_zero())
    }

    /// External value in minus external value out
    pub fn net_contributions(&self) -> Amount {
        self.net_contributions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use coinvault_core::{AccountId, CorrelationId, PendingEntry};
    use rust_decimal_macros::dec;

    fn btc() -> Asset {
        Asset::new("BTC").unwrap()
    }

    fn entry(asset: Asset, delta: Decimal, reason: EntryReason, price: Option<Decimal>) -> LedgerEntry {
        let mut pending = PendingEntry::new(
            AccountId::from("alice"),
            asset,
            delta,
            reason,
            CorrelationId::generate(),
            Utc::now(),
        );
        if let Some(price) = price {
            pending = pending.with_price(price);
        }
        pending.seal(1)
    }

    #[test]
    fn test_average_cost_across_buys_and_partial_sell() {
        let basis = CostBasis::from_entries(
            Asset::usd(),
            vec![
                entry(Asset::usd(), dec!(10000), EntryReason::Deposit, None),
                entry(btc(), dec!(0.1), EntryReason::TradeCredit, Some(dec!(40000))),
                entry(btc(), dec!(0.1), EntryReason::TradeCredit, Some(dec!(50000))),
                entry(btc(), dec!(-0.05), EntryReason::TradeDebit, Some(dec!(60000))),
            ],
        );

        let position = basis.position(&btc());
        assert_eq!(position.quantity, dec!(0.15));
        assert_eq!(position.average_cost(), dec!(45000));
        assert_eq!(position.cost, dec!(6750));
        assert_eq!(basis.net_contributions(), dec!(10000));
    }

    #[test]
    fn test_failed_withdrawal_is_contribution_neutral() {
        let basis = CostBasis::from_entries(
            Asset::usd(),
            vec![
                entry(btc(), dec!(1), EntryReason::Deposit, Some(dec!(40000))),
                entry(btc(), dec!(-1), EntryReason::Withdrawal, None),
                entry(btc(), dec!(1), EntryReason::WithdrawalReversal, None),
            ],
        );

        assert_eq!(basis.net_contributions(), dec!(40000));
        assert_eq!(basis.position(&btc()).cost, dec!(40000));
    }

    #[test]
    fn test_quote_asset_costs_one() {
        let basis = CostBasis::from_entries(
            Asset::usd(),
            vec![
                entry(Asset::usd(), dec!(1000), EntryReason::Deposit, None),
                entry(Asset::usd(), dec!(-60), EntryReason::Withdrawal, None),
            ],
        );

        assert_eq!(basis.position(&Asset::usd()).cost, dec!(940));
        assert_eq!(basis.net_contributions(), dec!(940));
    }

    #[test]
    fn test_closure_marker_is_ignored() {
        let basis = CostBasis::from_entries(
            Asset::usd(),
            vec![entry(Asset::usd(), dec!(0), EntryReason::AccountClosure, None)],
        );
        assert_eq!(basis.positions().count(), 0);
    }
}

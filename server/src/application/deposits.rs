//! Deposit confirmation
//!
//! Turns a confirmed inbound transfer into a `Deposit` ledger entry, net of
//! the method's fee. Non-quote assets are stamped with the reference price
//! at confirmation so the portfolio can carry a cost basis; without a fresh
//! price the deposit is refused rather than booked at an unknown value.

use std::sync::Arc;

use chrono::Duration;
use coinvault_core::{
    AccountId, Amount, Asset, AssetRegistry, CorrelationId, DepositMethod, EntryReason, LedgerEntry, Price, Timestamp,
};
use coinvault_ledger::{AccountLedger, LedgerError, Transfer};
use coinvault_ports::MarketDataProvider;
use log::{info, warn};
use rust_decimal::Decimal;
use thiserror::Error;

/// A transfer the upstream payment or chain watcher has seen arrive
#[derive(Debug, Clone)]
pub struct ConfirmDeposit {
    pub asset: Asset,
    /// Gross amount received, before the method's fee
    pub amount: Amount,
    pub method: DepositMethod,
    /// Chain confirmations; ignored for fiat methods
    pub confirmations: u32,
    /// External reference (tx hash, payment id); retries must reuse it
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub entry: LedgerEntry,
    pub fee: Amount,
    /// True when the deposit had already been credited
    pub replayed: bool,
}

#[derive(Error, Debug)]
pub enum DepositError {
    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    #[error("Unsupported asset {0}")]
    UnsupportedAsset(Asset),

    #[error("{method:?} deposits are not accepted for {asset}")]
    MethodNotAllowed { asset: Asset, method: DepositMethod },

    #[error("Deposit has {received} of {required} confirmations")]
    AwaitingConfirmations { required: u32, received: u32 },

    #[error("Deposit of {amount} does not cover the {fee} fee")]
    AmountBelowFee { amount: Amount, fee: Amount },

    #[error("No usable price for {symbol}: {reason}")]
    PriceUnavailable { symbol: Asset, reason: String },

    #[error("Price for {symbol} is stale (as of {as_of})")]
    StalePrice { symbol: Asset, as_of: Timestamp },

    #[error("Correlation id {0} is already used by a different operation")]
    CorrelationConflict(CorrelationId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct DepositDesk {
    ledger: Arc<AccountLedger>,
    market_data: Arc<dyn MarketDataProvider>,
    assets: AssetRegistry,
    max_price_age: Duration,
}

impl DepositDesk {
    pub fn new(
        ledger: Arc<AccountLedger>,
        market_data: Arc<dyn MarketDataProvider>,
        assets: AssetRegistry,
        max_price_age: Duration,
    ) -> Self {
        Self {
            ledger,
            market_data,
            assets,
            max_price_age,
        }
    }

    pub async fn confirm_deposit(
        &self,
        account_id: &AccountId,
        deposit: ConfirmDeposit,
    ) -> Result<DepositReceipt, DepositError> {
        let fee = self.validate(&deposit)?;

        // A retry is answered from the journal, even if prices are down now
        if let Some(original) = self.ledger.journal().find(account_id, &deposit.correlation_id) {
            return self.replayed(original, fee);
        }

        let credit = deposit.amount - fee;
        let mut transfer = Transfer::new(
            deposit.asset.clone(),
            credit,
            EntryReason::Deposit,
            deposit.correlation_id.clone(),
        );
        if &deposit.asset != self.assets.quote() {
            transfer = transfer.at_price(self.reference_price(&deposit.asset).await?);
        }

        match self.ledger.apply_transfer(account_id, transfer).await {
            Ok(entry) => {
                info!(
                    "Credited {} {} to {} via {:?} (fee {})",
                    credit, deposit.asset, account_id, deposit.method, fee
                );
                Ok(DepositReceipt {
                    entry,
                    fee,
                    replayed: false,
                })
            }
            Err(LedgerError::DuplicateCorrelationId { original, .. }) => self.replayed(original, fee),
            Err(e) => Err(e.into()),
        }
    }

    /// Check the deposit and return the fee it carries
    fn validate(&self, deposit: &ConfirmDeposit) -> Result<Amount, DepositError> {
        if deposit.amount <= Decimal::ZERO {
            return Err(DepositError::InvalidDeposit(format!(
                "amount must be positive, got {}",
                deposit.amount
            )));
        }
        if deposit.correlation_id.is_derived() {
            return Err(DepositError::InvalidDeposit(format!(
                "reference {} uses the reserved separator '{}'",
                deposit.correlation_id,
                CorrelationId::DERIVED_SEPARATOR
            )));
        }
        if !self.assets.is_supported(&deposit.asset) {
            return Err(DepositError::UnsupportedAsset(deposit.asset.clone()));
        }

        // Fiat rails carry the quote currency only, chains carry everything else
        let is_quote = &deposit.asset == self.assets.quote();
        if deposit.method.is_fiat() != is_quote {
            return Err(DepositError::MethodNotAllowed {
                asset: deposit.asset.clone(),
                method: deposit.method,
            });
        }

        if deposit.method == DepositMethod::Crypto && deposit.confirmations < DepositMethod::REQUIRED_CONFIRMATIONS {
            return Err(DepositError::AwaitingConfirmations {
                required: DepositMethod::REQUIRED_CONFIRMATIONS,
                received: deposit.confirmations,
            });
        }

        let fee = deposit.method.fee(deposit.amount);
        if deposit.amount <= fee {
            return Err(DepositError::AmountBelowFee {
                amount: deposit.amount,
                fee,
            });
        }
        Ok(fee)
    }

    fn replayed(&self, original: Vec<LedgerEntry>, fee: Amount) -> Result<DepositReceipt, DepositError> {
        match original.into_iter().next() {
            Some(entry) if entry.reason == EntryReason::Deposit => Ok(DepositReceipt {
                entry,
                fee,
                replayed: true,
            }),
            Some(entry) => Err(DepositError::CorrelationConflict(entry.correlation_id)),
            None => Err(DepositError::InvalidDeposit("empty journal record".into())),
        }
    }

    async fn reference_price(&self, asset: &Asset) -> Result<Price, DepositError> {
        let quote = self
            .market_data
            .reference_price(asset)
            .await
            .map_err(|e| DepositError::PriceUnavailable {
                symbol: asset.clone(),
                reason: e.to_string(),
            })?;
        if quote.price <= Decimal::ZERO {
            return Err(DepositError::PriceUnavailable {
                symbol: asset.clone(),
                reason: format!("non-positive price {}", quote.price),
            });
        }
        if quote.is_stale(self.ledger.clock().now(), self.max_price_age) {
            warn!("Refusing deposit priced off a stale {} quote", asset);
            return Err(DepositError::StalePrice {
                symbol: asset.clone(),
                as_of: quote.as_of,
            });
        }
        Ok(quote.price)
    }
}

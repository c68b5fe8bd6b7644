use async_trait::async_trait;
use coinvault_core::{Amount, Asset, Destination, SettlementId};

use crate::error::SettlementResult;

/// Port for moving funds off the platform (bank wire, on-chain transfer)
///
/// The ledger only guarantees internal balances; a successful call means the
/// provider accepted the transfer and returned a reference for it.
#[async_trait]
pub trait SettlementProvider: Send + Sync {
    async fn initiate_transfer(
        &self,
        asset: &Asset,
        amount: Amount,
        destination: &Destination,
    ) -> SettlementResult<SettlementId>;

    fn name(&self) -> &str {
        "SettlementProvider"
    }
}

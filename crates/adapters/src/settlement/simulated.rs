use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use coinvault_core::{Amount, Asset, Destination, SettlementId};
use coinvault_ports::{SettlementError, SettlementProvider, SettlementResult};
use log::info;
use parking_lot::Mutex;
use uuid::Uuid;

/// A transfer the simulator accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransfer {
    pub settlement_id: SettlementId,
    pub asset: Asset,
    pub amount: Amount,
    pub destination: Destination,
}

/// Settlement provider that accepts transfers locally
///
/// Failures and latency can be injected to exercise retry and compensation.
#[derive(Default)]
pub struct SimulatedSettlement {
    latency: Duration,
    /// Number of upcoming calls that fail as unreachable
    failures_pending: AtomicU32,
    refusing: AtomicBool,
    transfers: Mutex<Vec<SimulatedTransfer>>,
}

impl SimulatedSettlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The next `count` calls fail with `Unreachable`
    pub fn fail_next(&self, count: u32) {
        self.failures_pending.store(count, Ordering::SeqCst);
    }

    /// Refuse every transfer until switched back
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<SimulatedTransfer> {
        self.transfers.lock().clone()
    }
}

#[async_trait]
impl SettlementProvider for SimulatedSettlement {
    async fn initiate_transfer(
        &self,
        asset: &Asset,
        amount: Amount,
        destination: &Destination,
    ) -> SettlementResult<SettlementId> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failing = self
            .failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SettlementError::Unreachable("simulated outage".to_string()));
        }
        if self.refusing.load(Ordering::SeqCst) {
            return Err(SettlementError::Refused(format!("transfer to {} refused", destination.target())));
        }

        let settlement_id = format!("SIM-{}", Uuid::new_v4());
        info!("Simulated transfer {} {} to {} as {}", amount, asset, destination.target(), settlement_id);
        self.transfers.lock().push(SimulatedTransfer {
            settlement_id: settlement_id.clone(),
            asset: asset.clone(),
            amount,
            destination: destination.clone(),
        });
        Ok(settlement_id)
    }

    fn name(&self) -> &str {
        "SimulatedSettlement"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn destination() -> Destination {
        Destination::Crypto {
            network: "Bitcoin".to_string(),
            address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
        }
    }

    #[tokio::test]
    async fn test_accepts_and_records() {
        let settlement = SimulatedSettlement::new();
        let id = settlement
            .initiate_transfer(&Asset::new("BTC").unwrap(), dec!(0.01), &destination())
            .await
            .unwrap();

        assert!(id.starts_with("SIM-"));
        assert_eq!(settlement.transfers().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let settlement = SimulatedSettlement::new();
        settlement.fail_next(2);
        let btc = Asset::new("BTC").unwrap();

        for _ in 0..2 {
            assert!(matches!(
                settlement.initiate_transfer(&btc, dec!(1), &destination()).await,
                Err(SettlementError::Unreachable(_))
            ));
        }
        assert!(settlement.initiate_transfer(&btc, dec!(1), &destination()).await.is_ok());
    }
}

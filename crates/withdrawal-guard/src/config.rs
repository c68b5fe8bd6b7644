use std::time::Duration;

use coinvault_core::AssetRegistry;

use crate::pin::PinPolicy;

/// Retry window for the settlement provider
#[derive(Debug, Clone)]
pub struct SettlementPolicy {
    pub attempts: u32,
    pub attempt_timeout: Duration,
    /// Base delay; attempt n waits n * backoff before the next try
    pub backoff: Duration,
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuardConfig {
    /// Minimums, fees and payout kind per asset
    pub assets: AssetRegistry,
    pub pin_policy: PinPolicy,
    pub settlement: SettlementPolicy,
}

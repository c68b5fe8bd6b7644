use std::sync::Arc;

use chrono::Duration;
use coinvault_core::{
    AccountId, AccountStatus, Amount, Asset, AssetSpec, AuditEvent, AuditKind, CorrelationId, Destination,
    EntryReason, PayoutKind, SettlementId, Timestamp, WithdrawalId, WithdrawalRequest,
};
use coinvault_journal::AuditLog;
use coinvault_ledger::{AccountLedger, LedgerError, Settlement, Transfer};
use coinvault_ports::{Clock, SettlementError, SettlementProvider};
use log::{error, info, warn};
use rust_decimal::Decimal;

use crate::RECONCILIATION_TARGET;
use crate::config::GuardConfig;
use crate::error::{Result, WithdrawalError};
use crate::pin::{PIN_LENGTH, PinHasher, PinRecord};
use crate::repository::InMemoryWithdrawalRepository;
use crate::store::PinStore;

/// Withdrawal as submitted by the account holder
#[derive(Debug, Clone)]
pub struct RequestWithdrawal {
    pub asset: Asset,
    /// Amount that should reach the destination; the fee comes on top
    pub amount: Amount,
    pub destination: Destination,
    pub pin: String,
    pub correlation_id: Option<CorrelationId>,
}

pub struct WithdrawalGuard {
    ledger: Arc<AccountLedger>,
    settlement: Arc<dyn SettlementProvider>,
    pins: Arc<dyn PinStore>,
    hasher: PinHasher,
    requests: InMemoryWithdrawalRepository,
    audit: Arc<AuditLog>,
    config: GuardConfig,
}

impl WithdrawalGuard {
    pub fn new(
        ledger: Arc<AccountLedger>,
        settlement: Arc<dyn SettlementProvider>,
        pins: Arc<dyn PinStore>,
        hasher: PinHasher,
        audit: Arc<AuditLog>,
        config: GuardConfig,
    ) -> Self {
        Self {
            ledger,
            settlement,
            pins,
            hasher,
            requests: InMemoryWithdrawalRepository::new(),
            audit,
            config,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.ledger.clock()
    }

    // ------------------------------------------------------------------------
    // PIN management
    // ------------------------------------------------------------------------

    pub fn has_pin(&self, account_id: &AccountId) -> Result<bool> {
        Ok(self.pins.load(account_id)?.is_some())
    }

    /// First provisioning of the withdrawal PIN
    pub async fn set_pin(&self, account_id: &AccountId, pin: &str) -> Result<()> {
        check_pin_format(pin)?;
        let _guard = self.ledger.lock(account_id).await;

        if self.pins.load(account_id)?.is_some() {
            return Err(WithdrawalError::PinAlreadySet(account_id.clone()));
        }
        self.pins.save(account_id, &self.hasher.create(pin))?;

        self.audit_event(account_id, AuditKind::PinChanged, "withdrawal PIN set", None);
        info!("Withdrawal PIN set for {}", account_id);
        Ok(())
    }

    /// Replace the PIN; the current one is checked under the lockout policy
    pub async fn change_pin(&self, account_id: &AccountId, current: &str, new: &str) -> Result<()> {
        check_pin_format(current)?;
        check_pin_format(new)?;
        let _guard = self.ledger.lock(account_id).await;

        let record = self
            .pins
            .load(account_id)?
            .ok_or_else(|| WithdrawalError::PinNotSet(account_id.clone()))?;
        self.verify_pin(account_id, record, current, self.clock().now())?;
        self.pins.save(account_id, &self.hasher.create(new))?;

        self.audit_event(account_id, AuditKind::PinChanged, "withdrawal PIN changed", None);
        info!("Withdrawal PIN changed for {}", account_id);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Withdrawals
    // ------------------------------------------------------------------------

    /// Authorize, debit and settle a withdrawal
    ///
    /// Returns the request in `settled` or `failed_settlement`; refusals are
    /// stored as `rejected` requests and returned as errors.
    pub async fn request_withdrawal(
        &self,
        account_id: &AccountId,
        request: RequestWithdrawal,
    ) -> Result<WithdrawalRequest> {
        let spec = self.validate(&request)?;
        let (fee, minimum) = (spec.withdraw_fee, spec.min_withdraw);

        let mut guard = self.ledger.lock(account_id).await;
        if guard.status() == AccountStatus::Closed {
            return Err(WithdrawalError::AccountClosed(account_id.clone()));
        }

        if let Some(correlation_id) = &request.correlation_id {
            if let Some(existing) = self.requests.active_by_correlation(account_id, correlation_id) {
                info!("Withdrawal {} resubmitted under {}", existing.id, correlation_id);
                return Ok(existing);
            }
            if guard.committed(correlation_id).is_some() {
                return Err(WithdrawalError::DuplicateRequest(correlation_id.clone()));
            }
        }

        let record = self
            .pins
            .load(account_id)?
            .ok_or_else(|| WithdrawalError::PinNotSet(account_id.clone()))?;

        let now = self.clock().now();
        let mut pending = WithdrawalRequest::new(
            account_id.clone(),
            request.asset,
            request.amount,
            fee,
            request.destination,
            self.hasher.digest(&record.salt, &request.pin),
            request.correlation_id,
            now,
        );

        if pending.amount < minimum {
            let err = WithdrawalError::BelowMinimum {
                asset: pending.asset.clone(),
                minimum,
            };
            return Err(self.reject(pending, err));
        }
        if let Err(err) = self.verify_pin(account_id, record, &request.pin, now) {
            return Err(self.reject(pending, err));
        }

        let total = pending.total_debit();
        let token = match guard.reserve(&pending.asset, total) {
            Ok(token) => token,
            Err(LedgerError::InsufficientBalance { .. }) => {
                let err = WithdrawalError::InsufficientBalance {
                    asset: pending.asset.clone(),
                    required: total,
                };
                return Err(self.reject(pending, err));
            }
            Err(e) => return Err(e.into()),
        };
        if let Err(e) = pending.approve(now) {
            guard.release(token)?;
            return Err(e.into());
        }

        let debit = Settlement::debit(pending.correlation_id.clone(), total, EntryReason::Withdrawal);
        match guard.commit(token, debit) {
            Ok(_) => {}
            Err(LedgerError::DuplicateCorrelationId { correlation_id, .. }) => {
                return Err(WithdrawalError::DuplicateRequest(correlation_id));
            }
            Err(e) => return Err(e.into()),
        }
        self.requests.insert(pending.clone());
        drop(guard);

        info!(
            "Withdrawal {} approved: {} {} (fee {}) from {} to {}",
            pending.id,
            pending.amount,
            pending.asset,
            pending.fee,
            account_id,
            pending.destination.target()
        );

        match self.initiate_with_retry(&pending).await {
            Ok(settlement_id) => self.mark_settled(&pending, settlement_id),
            Err(reason) => self.compensate(&pending, reason).await,
        }
        Ok(self.requests.get(&pending.id).unwrap_or(pending))
    }

    /// Requests of the account, oldest first
    pub fn requests(&self, account_id: &AccountId) -> Vec<WithdrawalRequest> {
        self.requests.by_account(account_id)
    }

    pub fn request(&self, account_id: &AccountId, id: WithdrawalId) -> Result<WithdrawalRequest> {
        self.requests
            .get(&id)
            .filter(|r| &r.account_id == account_id)
            .ok_or(WithdrawalError::RequestNotFound(id))
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn validate(&self, request: &RequestWithdrawal) -> Result<&AssetSpec> {
        let spec = self
            .config
            .assets
            .get(&request.asset)
            .ok_or_else(|| WithdrawalError::UnsupportedAsset(request.asset.clone()))?;
        if request.amount <= Decimal::ZERO {
            return Err(WithdrawalError::InvalidRequest(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }
        check_pin_format(&request.pin)?;
        if let Some(correlation_id) = request.correlation_id.as_ref().filter(|id| id.is_derived()) {
            return Err(WithdrawalError::InvalidRequest(format!(
                "correlation id {} uses the reserved separator '{}'",
                correlation_id,
                CorrelationId::DERIVED_SEPARATOR
            )));
        }

        let destination_ok = match (spec.payout, &request.destination) {
            (PayoutKind::Bank, Destination::Bank { account_reference }) => !account_reference.trim().is_empty(),
            (PayoutKind::Crypto, Destination::Crypto { address, .. }) => !address.trim().is_empty(),
            _ => false,
        };
        if !destination_ok {
            let kind = match spec.payout {
                PayoutKind::Bank => "bank account",
                PayoutKind::Crypto => "wallet address",
            };
            return Err(WithdrawalError::InvalidRequest(format!(
                "{} withdrawals need a {} destination",
                spec.asset, kind
            )));
        }
        Ok(spec)
    }

    /// Lockout first, then a constant-time digest check
    fn verify_pin(&self, account_id: &AccountId, mut record: PinRecord, pin: &str, now: Timestamp) -> Result<()> {
        if let Some(remaining) = record.locked_for(now) {
            return Err(WithdrawalError::PinLocked {
                retry_after_secs: ceil_secs(remaining),
            });
        }

        if self.hasher.verify(&record, pin) {
            let before = record.clone();
            record.reset();
            if record.counters_differ(&before) {
                self.pins.save(account_id, &record)?;
            }
            return Ok(());
        }

        let remaining_attempts = record.register_failure(now, &self.config.pin_policy);
        self.pins.save(account_id, &record)?;

        if remaining_attempts == 0 {
            warn!("Withdrawal PIN locked for {}", account_id);
            self.audit_event(account_id, AuditKind::PinLocked, "too many invalid PIN attempts", None);
        } else {
            self.audit_event(
                account_id,
                AuditKind::PinFailed,
                format!("{remaining_attempts} attempts remaining"),
                None,
            );
        }
        Err(WithdrawalError::InvalidPin { remaining_attempts })
    }

    /// Store the request as rejected and hand the error back
    fn reject(&self, mut request: WithdrawalRequest, err: WithdrawalError) -> WithdrawalError {
        if !err.is_rejection() {
            return err;
        }
        let now = self.clock().now();
        if request.reject(err.to_string(), now).is_ok() {
            self.audit_event(
                &request.account_id,
                AuditKind::WithdrawalRejected,
                format!("{} {}: {}", request.amount, request.asset, err),
                Some(request.correlation_id.clone()),
            );
            info!("Withdrawal {} for {} rejected: {}", request.id, request.account_id, err);
            self.requests.insert(request);
        }
        err
    }

    async fn initiate_with_retry(&self, request: &WithdrawalRequest) -> std::result::Result<SettlementId, String> {
        let policy = &self.config.settlement;
        let attempts = policy.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let call = self
                .settlement
                .initiate_transfer(&request.asset, request.amount, &request.destination);
            match tokio::time::timeout(policy.attempt_timeout, call).await {
                Ok(Ok(settlement_id)) => return Ok(settlement_id),
                Ok(Err(SettlementError::Refused(reason))) => return Err(format!("refused: {reason}")),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("timed out after {:?}", policy.attempt_timeout),
            }
            warn!(
                "Settlement attempt {}/{} for withdrawal {} via {} failed: {}",
                attempt,
                attempts,
                request.id,
                self.settlement.name(),
                last_error
            );
            if attempt < attempts {
                tokio::time::sleep(policy.backoff * attempt).await;
            }
        }
        Err(last_error)
    }

    fn mark_settled(&self, request: &WithdrawalRequest, settlement_id: SettlementId) {
        let now = self.clock().now();
        let settled = self.requests.modify(&request.id, |r| r.settle(settlement_id.clone(), now));
        if let Some(Err(e)) = settled {
            warn!("Withdrawal {} settled as {} but not recorded: {}", request.id, settlement_id, e);
            return;
        }
        info!("Withdrawal {} settled as {}", request.id, settlement_id);
    }

    /// Credit the debit back and flag the request for reconciliation
    async fn compensate(&self, request: &WithdrawalRequest, reason: String) {
        let reversal = Transfer::new(
            request.asset.clone(),
            request.total_debit(),
            EntryReason::WithdrawalReversal,
            request.correlation_id.derive("reversal"),
        );

        match self.ledger.apply_transfer(&request.account_id, reversal).await {
            Ok(entry) => error!(
                target: RECONCILIATION_TARGET,
                "Withdrawal {} ({} {} to {}) failed settlement: {}; credited back at sequence {}",
                request.id,
                request.total_debit(),
                request.asset,
                request.destination.target(),
                reason,
                entry.sequence_number
            ),
            Err(LedgerError::DuplicateCorrelationId { .. }) => error!(
                target: RECONCILIATION_TARGET,
                "Withdrawal {} failed settlement: {}; reversal already journaled", request.id, reason
            ),
            Err(e) => error!(
                target: RECONCILIATION_TARGET,
                "Withdrawal {} failed settlement: {}; reversal of {} {} for {} NOT applied: {}",
                request.id,
                reason,
                request.total_debit(),
                request.asset,
                request.account_id,
                e
            ),
        }

        let now = self.clock().now();
        if let Some(Err(e)) = self.requests.modify(&request.id, |r| r.fail_settlement(reason.clone(), now)) {
            warn!("Withdrawal {} could not be marked failed: {}", request.id, e);
        }
        self.audit_event(
            &request.account_id,
            AuditKind::SettlementFailed,
            format!("withdrawal {}: {}", request.id, reason),
            Some(request.correlation_id.clone()),
        );
    }

    fn audit_event(
        &self,
        account_id: &AccountId,
        kind: AuditKind,
        detail: impl Into<String>,
        correlation_id: Option<CorrelationId>,
    ) {
        let mut event = AuditEvent::new(account_id.clone(), kind, detail, self.clock().now());
        if let Some(correlation_id) = correlation_id {
            event = event.with_correlation(correlation_id);
        }
        self.audit.record(event);
    }
}

fn check_pin_format(pin: &str) -> Result<()> {
    if PinHasher::is_valid_format(pin) {
        Ok(())
    } else {
        Err(WithdrawalError::InvalidPinFormat(PIN_LENGTH))
    }
}

fn ceil_secs(duration: Duration) -> i64 {
    (duration.num_milliseconds() + 999) / 1000
}

//! Integration tests for the withdrawal guard
//!
//! Tests cover:
//! - Settled withdrawals and fee arithmetic
//! - Minimums, balance and destination checks
//! - PIN verification, lockout and lockout persistence
//! - Settlement failure and compensation
//! - Idempotent resubmission
//! - Reserved correlation ids

use chrono::Duration;
use coinvault_adapters::SimulatedSettlement;
use coinvault_clock::ManualClock;
use coinvault_core::{
    AccountId, Asset, AuditKind, CorrelationId, Destination, EntryReason, WithdrawalStatus,
};
use coinvault_journal::{AuditLog, InMemoryJournalStore, TransactionJournal};
use coinvault_ledger::{AccountLedger, Transfer};
use coinvault_withdrawal_guard::{
    GuardConfig, InMemoryPinStore, JsonFilePinStore, PinHasher, PinStore, RequestWithdrawal, SettlementPolicy,
    WithdrawalError, WithdrawalGuard,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const PIN: &str = "123456";
const WRONG_PIN: &str = "000000";

fn btc() -> Asset {
    Asset::new("BTC").unwrap()
}

fn wallet() -> Destination {
    Destination::Crypto {
        network: "Bitcoin".to_string(),
        address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
    }
}

fn fast_config() -> GuardConfig {
    GuardConfig {
        settlement: SettlementPolicy {
            attempts: 3,
            attempt_timeout: std::time::Duration::from_millis(200),
            backoff: std::time::Duration::from_millis(1),
        },
        ..GuardConfig::default()
    }
}

struct TestContext {
    clock: Arc<ManualClock>,
    ledger: Arc<AccountLedger>,
    settlement: Arc<SimulatedSettlement>,
    audit: Arc<AuditLog>,
    guard: WithdrawalGuard,
    account: AccountId,
}

impl TestContext {
    async fn new() -> Self {
        let _ = env_logger::try_init();
        Self::with_pin_store(Arc::new(InMemoryPinStore::new())).await
    }

    async fn with_pin_store(pins: Arc<dyn PinStore>) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let journal = Arc::new(TransactionJournal::open(Arc::new(InMemoryJournalStore::new())).unwrap());
        let ledger = Arc::new(AccountLedger::recover(journal, clock.clone()).unwrap());
        let settlement = Arc::new(SimulatedSettlement::new());
        let audit = Arc::new(AuditLog::in_memory());
        let guard = WithdrawalGuard::new(
            ledger.clone(),
            settlement.clone(),
            pins,
            PinHasher::new("test-pepper"),
            audit.clone(),
            fast_config(),
        );
        let account = AccountId::from("alice");
        if !guard.has_pin(&account).unwrap() {
            guard.set_pin(&account, PIN).await.unwrap();
        }

        Self {
            clock,
            ledger,
            settlement,
            audit,
            guard,
            account,
        }
    }

    async fn deposit(&self, asset: Asset, amount: Decimal) {
        self.ledger
            .apply_transfer(
                &self.account,
                Transfer::new(asset, amount, EntryReason::Deposit, CorrelationId::generate()),
            )
            .await
            .unwrap();
    }

    fn btc_request(&self, amount: Decimal, pin: &str) -> RequestWithdrawal {
        RequestWithdrawal {
            asset: btc(),
            amount,
            destination: wallet(),
            pin: pin.to_string(),
            correlation_id: None,
        }
    }

    async fn available(&self, asset: &Asset) -> Decimal {
        self.ledger.balance(&self.account, asset).await.available
    }

    fn journal_len(&self) -> u64 {
        self.ledger.journal().last_sequence(&self.account)
    }
}

// ============================================================================
// SETTLEMENT TESTS
// ============================================================================

mod settlement_tests {
    use super::*;

    #[tokio::test]
    async fn test_withdrawal_settles_with_fee() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(0.5)).await;

        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.1), PIN))
            .await
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::Settled);
        assert_eq!(request.fee, dec!(0.0005));
        assert!(request.settlement_id.unwrap().starts_with("SIM-"));
        assert_eq!(ctx.available(&btc()).await, dec!(0.3995));

        // Destination receives the amount, the fee stays
        let transfers = ctx.settlement.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, dec!(0.1));

        let debit = ctx.ledger.journal().replay(&ctx.account).last().unwrap();
        assert_eq!(debit.reason, EntryReason::Withdrawal);
        assert_eq!(debit.delta, dec!(-0.1005));
    }

    #[tokio::test]
    async fn test_usd_bank_payout() {
        let ctx = TestContext::new().await;
        ctx.deposit(Asset::usd(), dec!(100)).await;

        let request = ctx
            .guard
            .request_withdrawal(
                &ctx.account,
                RequestWithdrawal {
                    asset: Asset::usd(),
                    amount: dec!(50),
                    destination: Destination::Bank {
                        account_reference: "DE89370400440532013000".to_string(),
                    },
                    pin: PIN.to_string(),
                    correlation_id: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::Settled);
        assert_eq!(ctx.available(&Asset::usd()).await, dec!(40));
    }

    #[tokio::test]
    async fn test_failed_settlement_is_credited_back() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(0.5)).await;
        ctx.settlement.fail_next(3);

        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.1), PIN))
            .await
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::FailedSettlement);
        assert!(request.failure_reason.is_some());
        assert_eq!(ctx.available(&btc()).await, dec!(0.5));

        let reversal = ctx
            .ledger
            .journal()
            .find(&ctx.account, &request.correlation_id.derive("reversal"))
            .unwrap();
        assert_eq!(reversal[0].reason, EntryReason::WithdrawalReversal);
        assert_eq!(reversal[0].delta, dec!(0.1005));

        let audit = ctx.audit.events(&ctx.account);
        assert!(audit.iter().any(|e| e.kind == AuditKind::SettlementFailed));
        ctx.ledger.verify_replay(&ctx.account).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_outage_is_retried() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(0.5)).await;
        ctx.settlement.fail_next(2);

        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.1), PIN))
            .await
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::Settled);
        assert_eq!(ctx.available(&btc()).await, dec!(0.3995));
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(0.5)).await;
        ctx.settlement.set_refusing(true);

        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.1), PIN))
            .await
            .unwrap();

        assert_eq!(request.status, WithdrawalStatus::FailedSettlement);
        assert!(request.failure_reason.unwrap().contains("refused"));
        assert_eq!(ctx.available(&btc()).await, dec!(0.5));
    }
}

// ============================================================================
// REJECTION TESTS
// ============================================================================

mod rejection_tests {
    use super::*;

    #[tokio::test]
    async fn test_insufficient_balance_writes_nothing() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(0.01)).await;
        let before = ctx.journal_len();

        let err = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.02), PIN))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WithdrawalError::InsufficientBalance { required, .. } if required == dec!(0.0205)
        ));
        assert_eq!(ctx.journal_len(), before);
        assert_eq!(ctx.available(&btc()).await, dec!(0.01));
        assert_eq!(ctx.ledger.balance(&ctx.account, &btc()).await.reserved, dec!(0));

        let stored = ctx.guard.requests(&ctx.account);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, WithdrawalStatus::Rejected);
    }

    #[tokio::test]
    async fn test_below_minimum() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;

        let err = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.0009), PIN))
            .await
            .unwrap_err();

        assert!(matches!(err, WithdrawalError::BelowMinimum { minimum, .. } if minimum == dec!(0.001)));
        assert_eq!(ctx.available(&btc()).await, dec!(1));
    }

    #[tokio::test]
    async fn test_format_errors_are_not_stored() {
        let ctx = TestContext::new().await;

        let short_pin = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), "1234"))
            .await;
        assert!(matches!(short_pin, Err(WithdrawalError::InvalidPinFormat(6))));

        let mut bank_for_btc = ctx.btc_request(dec!(0.01), PIN);
        bank_for_btc.destination = Destination::Bank {
            account_reference: "DE89370400440532013000".to_string(),
        };
        let wrong_destination = ctx.guard.request_withdrawal(&ctx.account, bank_for_btc).await;
        assert!(matches!(wrong_destination, Err(WithdrawalError::InvalidRequest(_))));

        assert!(ctx.guard.requests(&ctx.account).is_empty());
    }

    #[tokio::test]
    async fn test_pin_not_set() {
        let ctx = TestContext::new().await;
        let bob = AccountId::from("bob");

        let err = ctx
            .guard
            .request_withdrawal(&bob, ctx.btc_request(dec!(0.01), PIN))
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::PinNotSet(_)));
    }
}

// ============================================================================
// PIN TESTS
// ============================================================================

mod pin_tests {
    use super::*;

    async fn fail_pin(ctx: &TestContext) -> WithdrawalError {
        ctx.guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), WRONG_PIN))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_sixth_attempt_locked_even_with_correct_pin() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;

        for expected in [4, 3, 2, 1, 0] {
            let err = fail_pin(&ctx).await;
            assert!(matches!(
                err,
                WithdrawalError::InvalidPin { remaining_attempts } if remaining_attempts == expected
            ));
        }

        let err = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), PIN))
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::PinLocked { retry_after_secs: 900 }));
        assert_eq!(ctx.available(&btc()).await, dec!(1));

        let audit = ctx.audit.events(&ctx.account);
        assert!(audit.iter().any(|e| e.kind == AuditKind::PinLocked));
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;
        for _ in 0..5 {
            fail_pin(&ctx).await;
        }

        ctx.clock.advance(Duration::minutes(15));
        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), PIN))
            .await
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Settled);
    }

    #[tokio::test]
    async fn test_correct_pin_resets_counter() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;
        for _ in 0..4 {
            fail_pin(&ctx).await;
        }

        ctx.guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), PIN))
            .await
            .unwrap();

        let err = fail_pin(&ctx).await;
        assert!(matches!(err, WithdrawalError::InvalidPin { remaining_attempts: 4 }));
    }

    #[tokio::test]
    async fn test_lockout_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins.json");

        {
            let ctx = TestContext::with_pin_store(Arc::new(JsonFilePinStore::open(&path).unwrap())).await;
            ctx.deposit(btc(), dec!(1)).await;
            for _ in 0..5 {
                fail_pin(&ctx).await;
            }
        }

        let ctx = TestContext::with_pin_store(Arc::new(JsonFilePinStore::open(&path).unwrap())).await;
        ctx.deposit(btc(), dec!(1)).await;
        let err = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), PIN))
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::PinLocked { .. }));
    }

    #[tokio::test]
    async fn test_change_pin() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;

        let wrong = ctx.guard.change_pin(&ctx.account, WRONG_PIN, "654321").await;
        assert!(matches!(wrong, Err(WithdrawalError::InvalidPin { .. })));

        ctx.guard.change_pin(&ctx.account, PIN, "654321").await.unwrap();
        let old = fail_pin_with(&ctx, PIN).await;
        assert!(matches!(old, WithdrawalError::InvalidPin { .. }));

        let request = ctx
            .guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), "654321"))
            .await
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Settled);

        let again = ctx.guard.set_pin(&ctx.account, "111111").await;
        assert!(matches!(again, Err(WithdrawalError::PinAlreadySet(_))));
    }

    async fn fail_pin_with(ctx: &TestContext, pin: &str) -> WithdrawalError {
        ctx.guard
            .request_withdrawal(&ctx.account, ctx.btc_request(dec!(0.01), pin))
            .await
            .unwrap_err()
    }
}

// ============================================================================
// IDEMPOTENCY TESTS
// ============================================================================

mod idempotency_tests {
    use super::*;

    #[tokio::test]
    async fn test_resubmit_returns_stored_request() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;
        let mut request = ctx.btc_request(dec!(0.1), PIN);
        request.correlation_id = Some(CorrelationId::from("wd-1"));

        let first = ctx.guard.request_withdrawal(&ctx.account, request.clone()).await.unwrap();
        let second = ctx.guard.request_withdrawal(&ctx.account, request).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(ctx.settlement.transfers().len(), 1);
        assert_eq!(ctx.available(&btc()).await, dec!(0.8995));
    }

    #[tokio::test]
    async fn test_rejected_request_may_be_retried() {
        let ctx = TestContext::new().await;
        let mut request = ctx.btc_request(dec!(0.1), PIN);
        request.correlation_id = Some(CorrelationId::from("wd-2"));

        let err = ctx
            .guard
            .request_withdrawal(&ctx.account, request.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, WithdrawalError::InsufficientBalance { .. }));

        ctx.deposit(btc(), dec!(1)).await;
        let settled = ctx.guard.request_withdrawal(&ctx.account, request).await.unwrap();
        assert_eq!(settled.status, WithdrawalStatus::Settled);
        assert_eq!(ctx.guard.requests(&ctx.account).len(), 2);
    }

    #[tokio::test]
    async fn test_reversal_id_cannot_be_supplied() {
        let ctx = TestContext::new().await;
        ctx.deposit(btc(), dec!(1)).await;
        let mut request = ctx.btc_request(dec!(0.1), PIN);
        request.correlation_id = Some(CorrelationId::from("wd-3").derive("reversal"));

        let err = ctx.guard.request_withdrawal(&ctx.account, request).await.unwrap_err();
        assert!(matches!(err, WithdrawalError::InvalidRequest(_)));

        assert!(ctx.guard.requests(&ctx.account).is_empty());
        assert!(ctx.settlement.transfers().is_empty());
        assert_eq!(ctx.available(&btc()).await, dec!(1));
    }
}

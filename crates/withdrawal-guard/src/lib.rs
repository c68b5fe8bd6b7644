//! Withdrawal Guard
//!
//! Gates outbound transfers behind a withdrawal PIN, per-asset minimums and
//! balance checks, then hands the transfer to the settlement provider.
//!
//! ```text
//! request_withdrawal(account, request)
//!   │
//!   ├─ format ─────────────── InvalidRequest / UnsupportedAsset / InvalidPinFormat
//!   └─ account section ───────────────────────────────────────────┐
//!        amount ≥ minimum ───────────── BelowMinimum              │
//!        lockout ────────────────────── PinLocked                 │
//!        PIN (HMAC-SHA256, const time) ─ InvalidPin               │
//!        reserve amount+fee ─────────── InsufficientBalance       │
//!        approved, debit journaled ◀──────────────────────────────┘
//!   settlement provider (bounded retry)
//!        ok ─▶ settled
//!        exhausted ─▶ reversal credit, failed_settlement, reconciliation log
//! ```
//!
//! Failed PIN attempts and lockouts live in a [`PinStore`], so a restart does
//! not reset them.

mod config;
mod error;
mod guard;
mod pin;
mod repository;
mod store;

pub use config::{GuardConfig, SettlementPolicy};
pub use error::{PinStoreError, Result, WithdrawalError};
pub use guard::{RequestWithdrawal, WithdrawalGuard};
pub use pin::{PIN_LENGTH, PinHasher, PinPolicy, PinRecord};
pub use repository::InMemoryWithdrawalRepository;
pub use store::{InMemoryPinStore, JsonFilePinStore, PinStore};

/// Log target for withdrawals that need manual reconciliation
pub const RECONCILIATION_TARGET: &str = "coinvault::reconciliation";

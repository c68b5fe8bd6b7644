//! Coinvault Core Domain
//!
//! Pure domain types for the Coinvault account ledger.
//! No async and no I/O: amounts, identifiers, entities and their state machines.

pub mod entities;
pub mod error;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Ledger types
    AccountStatus,
    AssetBalance,
    EntryReason,
    LedgerEntry,
    PendingEntry,
    // Asset catalogue
    AssetRegistry,
    AssetSpec,
    DepositMethod,
    PayoutKind,
    // Audit trail
    AuditEvent,
    AuditKind,
    // Trading entities
    Order,
    OrderId,
    OrderKind,
    OrderStatus,
    RejectReason,
    Side,
    Trade,
    TradeId,
    // Withdrawal entities
    Destination,
    SettlementId,
    WithdrawalId,
    WithdrawalRequest,
    WithdrawalStatus,
    // Derived views
    Holding,
    PortfolioStats,
};
pub use error::{InvalidAsset, TransitionError};
pub use values::{AccountId, Amount, Asset, CorrelationId, Price, SequenceNumber, Timestamp};

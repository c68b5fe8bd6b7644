mod account;
mod asset_spec;
mod audit;
mod deposit;
mod holding;
mod ledger_entry;
mod order;
mod order_status;
mod side;
mod trade;
mod withdrawal;

pub use account::{AccountStatus, AssetBalance};
pub use asset_spec::{AssetRegistry, AssetSpec, PayoutKind};
pub use audit::{AuditEvent, AuditKind};
pub use deposit::DepositMethod;
pub use holding::{Holding, PortfolioStats};
pub use ledger_entry::{EntryReason, LedgerEntry, PendingEntry};
pub use order::{Order, OrderId, OrderKind, RejectReason};
pub use order_status::OrderStatus;
pub use side::Side;
pub use trade::{Trade, TradeId};
pub use withdrawal::{Destination, SettlementId, WithdrawalId, WithdrawalRequest, WithdrawalStatus};

//! Application services that sit beside the engines
//!
//! Account registration and deposit confirmation have no crate of their own;
//! both are thin orchestration over the ledger.

pub mod accounts;
pub mod deposits;

pub use accounts::{AccountDesk, AccountError, AccountSummary};
pub use deposits::{ConfirmDeposit, DepositDesk, DepositError, DepositReceipt};

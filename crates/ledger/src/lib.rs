//! Account Ledger
//!
//! The only component allowed to change balances. Each account has an
//! [`AccountBook`] of `available` / `reserved` amounts per asset, guarded by a
//! FIFO async mutex. Every change is journaled before it is applied:
//!
//! ```text
//!   reserve ──▶ available → reserved               (in memory only)
//!   commit  ──▶ journal.append_batch(debit, credit) ──▶ reserved → gone, credit → available
//!   release ──▶ reserved → available               (in memory only)
//!   transfer ─▶ journal.append(entry) ──▶ available ± delta
//! ```
//!
//! If the journal append fails nothing is applied. Reservations are not
//! journaled: after a restart the books are rebuilt from entries alone, so any
//! reservation outstanding at crash time is simply gone (released).
//!
//! Engines that need check-then-act sequences take the account section with
//! [`AccountLedger::lock`] and work through the returned [`AccountGuard`];
//! the convenience methods on [`AccountLedger`] take it internally.

mod book;
mod error;
mod guard;
mod ledger;
mod reservation;

pub use book::{AccountBook, AccountSnapshot};
pub use error::{LedgerError, Result};
pub use guard::AccountGuard;
pub use ledger::{AccountLedger, ReplayReport};
pub use reservation::{Credit, ReservationId, ReservationToken, Settlement, Transfer};

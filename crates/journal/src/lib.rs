//! Transaction Journal
//!
//! The journal is the source of truth for balances. Every balance change is a
//! [`LedgerEntry`](coinvault_core::LedgerEntry) appended here before it becomes
//! visible anywhere else, and account balances can always be rebuilt by
//! replaying an account's entries in sequence order.
//!
//! ```text
//! AccountLedger ──append_batch──▶ TransactionJournal ──persist──▶ JournalStore
//!                                   │  per-account sequence          ├── InMemoryJournalStore
//!                                   │  correlation index             └── JsonLinesJournalStore
//!                                   │
//!                                   └──replay(account)──▶ Replay (lazy, restartable)
//! ```
//!
//! Correlation ids are unique per account: a second append under a committed
//! correlation id fails with [`JournalError::DuplicateCorrelationId`] and
//! carries the original entries so the caller can answer a retry with the
//! original result.
//!
//! Events that move no balance (rejections, PIN lockouts, failed settlements)
//! go to the separate [`AuditLog`].

mod audit;
mod error;
mod journal;
mod replay;
pub mod store;

pub use audit::AuditLog;
pub use error::{JournalError, Result};
pub use journal::TransactionJournal;
pub use replay::Replay;
pub use store::{InMemoryJournalStore, JournalStore, JsonLinesJournalStore};

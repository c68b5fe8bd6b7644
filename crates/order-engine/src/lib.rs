//! Order Engine
//!
//! Turns buy/sell requests into ledger commits at an externally supplied
//! reference price. Orders fill in full or are rejected; there is no book and
//! no counterparty.
//!
//! ```text
//! submit(account, command)
//!   │
//!   ├─ validate ─────────────── Err(InvalidOrder / UnsupportedSymbol)
//!   ├─ idempotency (account, correlation id) ── existing order returned as-is
//!   ├─ reference price (no lock held)
//!   │     stale ─▶ Rejected(StalePrice)     failed ─▶ Rejected(PriceUnavailable)
//!   │     limit not met ─▶ Rejected(PriceNotMet)
//!   └─ account section ─────────────────────────────────────────────┐
//!        still pending?  (cancel takes the same section)             │
//!        buy:  reserve quote total+fee ─▶ commit -quote, +base        │
//!        sell: reserve base amount    ─▶ commit -base,  +quote-fee    │
//!        short balance ─▶ Rejected(InsufficientFunds / Holdings)     │
//!        filled + trade recorded ◀─────────────────────────────────┘
//! ```
//!
//! Business rejections are `Ok` results carrying a rejected order; they are
//! written to the audit log and never touch the journal.

mod command;
mod config;
mod engine;
mod error;
mod repository;

pub use command::{SubmitOrderCommand, SubmitOrderResult, TradingPair};
pub use config::EngineConfig;
pub use engine::OrderEngine;
pub use error::{OrderError, Result};
pub use repository::InMemoryOrderRepository;

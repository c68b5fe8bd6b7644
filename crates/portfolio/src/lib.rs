//! Portfolio Valuator
//!
//! Read-only views over an account: current holdings priced at the reference
//! price, allocation, average-cost basis and performance against external
//! contributions. Nothing here is stored; every call replays the journal, so
//! the figures always tie out with it.

mod cost_basis;
mod error;
mod valuator;

pub use cost_basis::{CostBasis, Position};
pub use error::{Result, ValuationError};
pub use valuator::{PortfolioValuator, Valuation, ValuationConfig};

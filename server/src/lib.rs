//! Coinvault Server
//!
//! REST surface over the account ledger, order engine, withdrawal guard and
//! portfolio valuator.
//!
//! # Architecture
//!
//! - **Application**: account registration and deposit confirmation
//! - **Presentation**: axum router, DTOs, error mapping, account context
//! - **Wiring**: [`Vault`] builds every component from a [`ServiceConfig`]
//!
//! # Example
//!
//! ```ignore
//! use coinvault_server::{ServiceConfig, Vault};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let vault = Vault::from_config(ServiceConfig::default())?;
//!     vault.run().await
//! }
//! ```

pub mod application;
pub mod config;
pub mod presentation;

pub use config::{ConfigError, PriceSource, ServiceConfig};
pub use presentation::{AccountContext, ApiError, AppState, create_router};

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use coinvault_adapters::{CoinGeckoPriceFeed, FixturePriceFeed, SimulatedSettlement};
use coinvault_clock::SystemClock;
use coinvault_core::{Asset, AssetRegistry};
use coinvault_journal::{AuditLog, InMemoryJournalStore, JournalError, JournalStore, JsonLinesJournalStore, TransactionJournal};
use coinvault_ledger::{AccountLedger, LedgerError};
use coinvault_order_engine::OrderEngine;
use coinvault_portfolio::PortfolioValuator;
use coinvault_ports::{Clock, MarketDataError, MarketDataProvider, SettlementProvider};
use coinvault_withdrawal_guard::{InMemoryPinStore, JsonFilePinStore, PinHasher, PinStore, PinStoreError, WithdrawalGuard};
use thiserror::Error;
use tokio::net::TcpListener;

use application::{AccountDesk, DepositDesk};
use config::StorageConfig;

/// Failure while assembling the service
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot prepare data directory {path}: {error}")]
    DataDir { path: String, error: std::io::Error },

    #[error("Journal: {0}")]
    Journal(#[from] JournalError),

    #[error("Ledger recovery: {0}")]
    Ledger(#[from] LedgerError),

    #[error("PIN store: {0}")]
    PinStore(#[from] PinStoreError),

    #[error("Market data: {0}")]
    MarketData(#[from] MarketDataError),
}

/// External collaborators the vault is built around
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub journal_store: Arc<dyn JournalStore>,
    pub audit: Arc<AuditLog>,
    pub pins: Arc<dyn PinStore>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub settlement: Arc<dyn SettlementProvider>,
}

impl Collaborators {
    /// Everything in memory, priced off the fixture table
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            market_data: Arc::new(FixturePriceFeed::standard(Arc::clone(&clock))),
            clock,
            journal_store: Arc::new(InMemoryJournalStore::new()),
            audit: Arc::new(AuditLog::in_memory()),
            pins: Arc::new(InMemoryPinStore::new()),
            settlement: Arc::new(SimulatedSettlement::new()),
        }
    }
}

/// The assembled service
pub struct Vault {
    pub config: ServiceConfig,
    pub ledger: Arc<AccountLedger>,
    pub audit: Arc<AuditLog>,
    pub accounts: Arc<AccountDesk>,
    pub orders: Arc<OrderEngine>,
    pub withdrawals: Arc<WithdrawalGuard>,
    pub deposits: Arc<DepositDesk>,
    pub portfolio: Arc<PortfolioValuator>,
}

impl Vault {
    /// Build from configuration: stores under `storage.data_dir` (or in
    /// memory), the configured price source and simulated settlement
    pub fn from_config(config: ServiceConfig) -> Result<Self, StartupError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

        let journal_store: Arc<dyn JournalStore>;
        let audit: Arc<AuditLog>;
        let pins: Arc<dyn PinStore>;
        match &config.storage.data_dir {
            Some(dir) => {
                prepare_data_dir(dir)?;
                journal_store = Arc::new(JsonLinesJournalStore::open(dir.join(StorageConfig::JOURNAL_FILE))?);
                audit = Arc::new(AuditLog::open(dir.join(StorageConfig::AUDIT_FILE))?);
                pins = Arc::new(JsonFilePinStore::open(dir.join(StorageConfig::PIN_FILE))?);
            }
            None => {
                tracing::warn!("No data_dir configured; journal and PINs are kept in memory only");
                journal_store = Arc::new(InMemoryJournalStore::new());
                audit = Arc::new(AuditLog::in_memory());
                pins = Arc::new(InMemoryPinStore::new());
            }
        }

        let market_data = market_data_provider(&config, Arc::clone(&clock))?;

        Self::assemble(
            config,
            Collaborators {
                clock,
                journal_store,
                audit,
                pins,
                market_data,
                settlement: Arc::new(SimulatedSettlement::new()),
            },
        )
    }

    /// Build around the given collaborators; balances are recovered from the journal
    pub fn assemble(config: ServiceConfig, parts: Collaborators) -> Result<Self, StartupError> {
        let journal = Arc::new(TransactionJournal::open(parts.journal_store)?);
        let ledger = Arc::new(AccountLedger::recover(journal, parts.clock)?);
        let audit = parts.audit;

        let orders = Arc::new(OrderEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&parts.market_data),
            Arc::clone(&audit),
            config.engine_config(),
        ));
        let withdrawals = Arc::new(WithdrawalGuard::new(
            Arc::clone(&ledger),
            parts.settlement,
            parts.pins,
            PinHasher::new(&config.withdrawals.pin_pepper),
            Arc::clone(&audit),
            config.guard_config(),
        ));
        let deposits = Arc::new(DepositDesk::new(
            Arc::clone(&ledger),
            Arc::clone(&parts.market_data),
            AssetRegistry::standard(),
            config.max_price_age(),
        ));
        let portfolio = Arc::new(PortfolioValuator::new(
            Arc::clone(&ledger),
            parts.market_data,
            config.valuation_config(),
        ));
        let accounts = Arc::new(AccountDesk::new(
            Arc::clone(&ledger),
            Arc::clone(&withdrawals),
            Arc::clone(&audit),
        ));

        Ok(Vault {
            config,
            ledger,
            audit,
            accounts,
            orders,
            withdrawals,
            deposits,
            portfolio,
        })
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            ledger: Arc::clone(&self.ledger),
            accounts: Arc::clone(&self.accounts),
            orders: Arc::clone(&self.orders),
            withdrawals: Arc::clone(&self.withdrawals),
            deposits: Arc::clone(&self.deposits),
            portfolio: Arc::clone(&self.portfolio),
            audit: Arc::clone(&self.audit),
        })
    }

    /// Create the REST API router
    pub fn rest_router(&self) -> Router {
        create_router(self.app_state())
    }

    /// Run the HTTP server until it fails
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let router = self.rest_router();

        tracing::info!("Coinvault listening on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

fn prepare_data_dir(dir: &Path) -> Result<(), StartupError> {
    std::fs::create_dir_all(dir).map_err(|error| StartupError::DataDir {
        path: dir.display().to_string(),
        error,
    })
}

fn market_data_provider(
    config: &ServiceConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn MarketDataProvider>, StartupError> {
    let md = &config.market_data;
    match md.provider {
        PriceSource::Fixture if md.prices.is_empty() => Ok(Arc::new(FixturePriceFeed::standard(clock))),
        PriceSource::Fixture => {
            let feed = FixturePriceFeed::new(clock);
            for (symbol, price) in &md.prices {
                let asset = Asset::new(symbol).map_err(|e| ConfigError::Invalid(e.to_string()))?;
                feed.set_price(asset, *price);
            }
            Ok(Arc::new(feed))
        }
        PriceSource::CoinGecko => {
            let base_url = md.base_url.as_deref().unwrap_or(CoinGeckoPriceFeed::DEFAULT_BASE_URL);
            tracing::info!("Pricing from CoinGecko at {}", base_url);
            Ok(Arc::new(CoinGeckoPriceFeed::new(base_url)?))
        }
    }
}

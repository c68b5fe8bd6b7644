use axum::{
    Router,
    routing::{delete, get, post, put},
};
use coinvault_journal::AuditLog;
use coinvault_ledger::AccountLedger;
use coinvault_order_engine::OrderEngine;
use coinvault_portfolio::PortfolioValuator;
use coinvault_withdrawal_guard::WithdrawalGuard;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::application::{AccountDesk, DepositDesk};

/// Services shared across handlers
pub struct AppState {
    pub ledger: Arc<AccountLedger>,
    pub accounts: Arc<AccountDesk>,
    pub orders: Arc<OrderEngine>,
    pub withdrawals: Arc<WithdrawalGuard>,
    pub deposits: Arc<DepositDesk>,
    pub portfolio: Arc<PortfolioValuator>,
    pub audit: Arc<AuditLog>,
}

/// Create the REST API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Account lifecycle
        .route("/accounts", post(handlers::open_account))
        .route("/accounts", get(handlers::get_account))
        .route("/accounts", delete(handlers::close_account))
        // Trading
        .route("/trading/orders", post(handlers::submit_order))
        .route("/trading/orders", get(handlers::list_orders))
        .route("/trading/orders/{order_id}", delete(handlers::cancel_order))
        .route("/trading/history", get(handlers::trade_history))
        .route("/trading/pairs", get(handlers::trading_pairs))
        // Portfolio
        .route("/portfolio", get(handlers::holdings))
        .route("/portfolio/stats", get(handlers::portfolio_stats))
        .route("/portfolio/transactions", get(handlers::list_transactions))
        .route("/portfolio/transactions", post(handlers::add_transaction))
        // Wallet
        .route("/wallet/deposits", post(handlers::confirm_deposit))
        .route("/wallet/withdrawals", post(handlers::request_withdrawal))
        .route("/wallet/withdrawals", get(handlers::list_withdrawals))
        .route("/wallet/pin", put(handlers::set_pin))
        // Operations
        .route("/admin/accounts/{account_id}/verify", get(handlers::verify_account))
        .route("/admin/accounts/{account_id}/audit", get(handlers::audit_trail))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

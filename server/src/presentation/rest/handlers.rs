use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use coinvault_core::{
    AccountId, Asset, AuditEvent, CorrelationId, EntryReason, Holding, LedgerEntry, Order, OrderKind, OrderStatus,
    PortfolioStats, Trade, WithdrawalRequest,
};
use coinvault_ledger::{LedgerError, Transfer};
use coinvault_order_engine::SubmitOrderCommand;
use coinvault_withdrawal_guard::RequestWithdrawal;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::ConfirmDeposit;
use crate::presentation::rest::{AccountContext, ApiError, dto::*};

use super::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// Accounts
// ============================================================================

/// POST /accounts
pub async fn open_account(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<OpenAccountRequest>,
) -> ApiResult<AccountResponse> {
    let summary = state.accounts.open(&ctx.account_id, req.pin.as_deref()).await?;
    Ok(Json(summary.into()))
}

/// GET /accounts
pub async fn get_account(State(state): State<Arc<AppState>>, ctx: AccountContext) -> ApiResult<AccountResponse> {
    let summary = state.accounts.summary_of(&ctx.account_id).await?;
    Ok(Json(summary.into()))
}

/// DELETE /accounts
pub async fn close_account(State(state): State<Arc<AppState>>, ctx: AccountContext) -> ApiResult<AccountResponse> {
    let summary = state.accounts.close(&ctx.account_id).await?;
    Ok(Json(summary.into()))
}

// ============================================================================
// Trading
// ============================================================================

/// POST /trading/orders
///
/// A fill answers 200; an order the engine rejects answers with the
/// rejection's code and carries the stored order.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<OrderResponse> {
    let symbol = parse_symbol(&req.symbol)?;
    let kind = req.kind.unwrap_or(OrderKind::Market);

    let mut command = match (kind, req.limit_price) {
        (OrderKind::Market, None) => SubmitOrderCommand::market(symbol, req.side, req.amount),
        (OrderKind::Limit, Some(limit)) => SubmitOrderCommand::limit(symbol, req.side, req.amount, limit),
        (OrderKind::Limit, None) => return Err(ApiError::invalid_parameter("limitPrice", "required for limit orders")),
        (OrderKind::Market, Some(_)) => {
            return Err(ApiError::invalid_parameter("limitPrice", "not allowed on market orders"));
        }
    };
    if let Some(client_order_id) = req.client_order_id {
        command = command.with_client_order_id(client_order_id);
    }

    let result = state.orders.submit(&ctx.account_id, command).await?;
    if result.order.status == OrderStatus::Rejected {
        return Err(ApiError::order_rejected(&result.order));
    }
    Ok(Json(result.into()))
}

/// GET /trading/orders
pub async fn list_orders(State(state): State<Arc<AppState>>, ctx: AccountContext) -> Json<Vec<Order>> {
    Json(state.orders.orders(&ctx.account_id))
}

/// DELETE /trading/orders/{order_id}
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Order> {
    Ok(Json(state.orders.cancel(&ctx.account_id, order_id).await?))
}

/// GET /trading/history
pub async fn trade_history(State(state): State<Arc<AppState>>, ctx: AccountContext) -> Json<Vec<Trade>> {
    Json(state.orders.trades(&ctx.account_id))
}

/// GET /trading/pairs
pub async fn trading_pairs(State(state): State<Arc<AppState>>) -> Json<Vec<TradingPairResponse>> {
    Json(state.orders.trading_pairs().into_iter().map(Into::into).collect())
}

// ============================================================================
// Portfolio
// ============================================================================

/// GET /portfolio
pub async fn holdings(State(state): State<Arc<AppState>>, ctx: AccountContext) -> ApiResult<Vec<Holding>> {
    Ok(Json(state.portfolio.holdings(&ctx.account_id).await?))
}

/// GET /portfolio/stats
pub async fn portfolio_stats(State(state): State<Arc<AppState>>, ctx: AccountContext) -> ApiResult<PortfolioStats> {
    Ok(Json(state.portfolio.stats(&ctx.account_id).await?))
}

/// GET /portfolio/transactions
pub async fn list_transactions(State(state): State<Arc<AppState>>, ctx: AccountContext) -> Json<Vec<LedgerEntry>> {
    Json(state.ledger.journal().replay(&ctx.account_id).collect())
}

/// POST /portfolio/transactions
pub async fn add_transaction(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<ManualEntryRequest>,
) -> ApiResult<EntryResponse> {
    let asset = parse_asset("asset", &req.asset)?;
    let correlation_id = req
        .correlation_id
        .map(CorrelationId::new)
        .unwrap_or_else(CorrelationId::generate);
    if correlation_id.is_derived() {
        return Err(ApiError::invalid_parameter(
            "correlationId",
            format!("must not contain '{}'", CorrelationId::DERIVED_SEPARATOR),
        ));
    }

    let mut transfer = Transfer::new(asset, req.amount, EntryReason::Adjustment, correlation_id);
    if let Some(price) = req.price {
        if price <= Decimal::ZERO {
            return Err(ApiError::invalid_parameter("price", "must be positive"));
        }
        transfer = transfer.at_price(price);
    }

    match state.ledger.apply_transfer(&ctx.account_id, transfer).await {
        Ok(entry) => Ok(Json(EntryResponse { entry, replayed: false })),
        Err(LedgerError::DuplicateCorrelationId { original, .. })
            if original.len() == 1 && original[0].reason == EntryReason::Adjustment =>
        {
            let entry = original.into_iter().next().ok_or_else(|| ApiError::internal("empty journal record"))?;
            Ok(Json(EntryResponse { entry, replayed: true }))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// POST /wallet/deposits
pub async fn confirm_deposit(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositResponse> {
    if req.reference.trim().is_empty() {
        return Err(ApiError::invalid_parameter("reference", "must not be empty"));
    }
    let deposit = ConfirmDeposit {
        asset: parse_asset("asset", &req.asset)?,
        amount: req.amount,
        method: req.method,
        confirmations: req.confirmations,
        correlation_id: CorrelationId::new(req.reference.trim()),
    };

    let receipt = state.deposits.confirm_deposit(&ctx.account_id, deposit).await?;
    Ok(Json(receipt.into()))
}

/// POST /wallet/withdrawals
///
/// Answers with the request in `settled` or `failed_settlement`.
pub async fn request_withdrawal(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<CreateWithdrawalRequest>,
) -> ApiResult<WithdrawalRequest> {
    let request = RequestWithdrawal {
        asset: parse_asset("asset", &req.asset)?,
        amount: req.amount,
        destination: req.destination,
        pin: req.pin,
        correlation_id: req.correlation_id.map(CorrelationId::new),
    };

    Ok(Json(state.withdrawals.request_withdrawal(&ctx.account_id, request).await?))
}

/// GET /wallet/withdrawals
pub async fn list_withdrawals(State(state): State<Arc<AppState>>, ctx: AccountContext) -> Json<Vec<WithdrawalRequest>> {
    Json(state.withdrawals.requests(&ctx.account_id))
}

/// PUT /wallet/pin
pub async fn set_pin(
    State(state): State<Arc<AppState>>,
    ctx: AccountContext,
    Json(req): Json<SetPinRequest>,
) -> Result<StatusCode, ApiError> {
    match req.current_pin {
        None => state.withdrawals.set_pin(&ctx.account_id, &req.pin).await?,
        Some(current) => state.withdrawals.change_pin(&ctx.account_id, &current, &req.pin).await?,
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Operations
// ============================================================================

/// GET /admin/accounts/{account_id}/verify
pub async fn verify_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<ReplayReportResponse> {
    let report = state.ledger.verify_replay(&AccountId::from(account_id)).await?;
    Ok(Json(report.into()))
}

/// GET /admin/accounts/{account_id}/audit
pub async fn audit_trail(State(state): State<Arc<AppState>>, Path(account_id): Path<String>) -> Json<Vec<AuditEvent>> {
    Json(state.audit.events(&AccountId::from(account_id)))
}

// ============================================================================
// Parsing helpers
// ============================================================================

fn parse_asset(param: &str, raw: &str) -> Result<Asset, ApiError> {
    Asset::new(raw).map_err(|e| ApiError::invalid_parameter(param, e))
}

/// Accept "BTC" as well as "BTC/USD"
fn parse_symbol(raw: &str) -> Result<Asset, ApiError> {
    let base = match raw.split_once('/') {
        Some((base, quote)) if quote.trim().eq_ignore_ascii_case(Asset::QUOTE) => base,
        Some(_) => {
            return Err(ApiError::validation(
                "UnsupportedSymbol",
                format!("Pairs are quoted in {}, got {}", Asset::QUOTE, raw),
            ));
        }
        None => raw,
    };
    parse_asset("symbol", base)
}

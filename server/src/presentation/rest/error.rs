use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coinvault_core::{Order, RejectReason};
use coinvault_journal::JournalError;
use coinvault_ledger::LedgerError;
use coinvault_order_engine::OrderError;
use coinvault_portfolio::ValuationError;
use coinvault_withdrawal_guard::WithdrawalError;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::{AccountError, DepositError};
use crate::presentation::rest::dto::ErrorResponse;

/// API error type
///
/// Serialized as `{"code": "<Kind>", "msg": "<text>", ...detail}`.
#[derive(Debug)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub status: StatusCode,
    pub detail: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            status,
            detail: Map::new(),
        }
    }

    /// Malformed or out-of-range input
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    /// Well-formed request refused by a business rule
    pub fn business(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    /// A collaborator (price feed, storage) could not serve the request
    pub fn unavailable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, code, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthenticated", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", message)
    }

    pub fn invalid_parameter(param: &str, reason: impl std::fmt::Display) -> Self {
        Self::validation("InvalidParameter", format!("Illegal parameter '{}': {}", param, reason))
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        self.detail
            .insert(key.to_string(), serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    /// An order the engine stored as rejected
    pub fn order_rejected(order: &Order) -> Self {
        let reason = order.rejection.unwrap_or(RejectReason::PriceUnavailable);
        let message = format!("Order {} rejected: {}", order.id, reason);
        let err = match reason {
            RejectReason::StalePrice | RejectReason::PriceUnavailable => Self::unavailable(reason.code(), message),
            _ => Self::business(reason.code(), message),
        };
        err.with_detail("order", order)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(code = self.code, "{}", self.message);
        }
        let body = Json(ErrorResponse {
            code: self.code.to_string(),
            msg: self.message,
            detail: self.detail,
        });
        (self.status, body).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// Domain error mapping
// ============================================================================

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Unavailable(_) | JournalError::Storage(_) => {
                ApiError::unavailable("JournalUnavailable", err.to_string())
            }
            JournalError::DuplicateCorrelationId { correlation_id, .. } => ApiError::conflict(
                "DuplicateCorrelationId",
                format!("Correlation id {} already committed", correlation_id),
            ),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InsufficientBalance {
                asset,
                available,
                requested,
            } => ApiError::business("InsufficientBalance", message)
                .with_detail("asset", asset)
                .with_detail("available", available)
                .with_detail("requested", requested),
            LedgerError::DuplicateCorrelationId { correlation_id, .. } => {
                ApiError::conflict("DuplicateCorrelationId", message).with_detail("correlationId", correlation_id)
            }
            LedgerError::InvalidAmount(_) => ApiError::validation("InvalidAmount", message),
            LedgerError::AmountOverflow { asset, .. } => {
                ApiError::validation("InvalidAmount", message).with_detail("asset", asset)
            }
            LedgerError::AccountClosed(_) => ApiError::conflict("AccountClosed", message),
            LedgerError::AccountNotEmpty(_) => ApiError::business("AccountNotEmpty", message),
            LedgerError::ReplayMismatch {
                asset, live, replayed, ..
            } => ApiError::internal(message)
                .with_code("ReplayMismatch")
                .with_detail("asset", asset)
                .with_detail("live", live)
                .with_detail("replayed", replayed),
            LedgerError::Journal(e) => e.into(),
            LedgerError::UnknownReservation(_) | LedgerError::CommitExceedsReservation { .. } => {
                ApiError::internal(message)
            }
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::InvalidOrder(_) => ApiError::validation("InvalidOrder", message),
            OrderError::UnsupportedSymbol(symbol) => {
                ApiError::validation("UnsupportedSymbol", message).with_detail("symbol", symbol)
            }
            OrderError::OrderNotFound(_) => ApiError::not_found("OrderNotFound", message),
            OrderError::InvalidState { status, .. } => {
                ApiError::conflict("InvalidState", message).with_detail("status", status)
            }
            OrderError::AccountClosed(_) => ApiError::conflict("AccountClosed", message),
            OrderError::CorrelationConflict(_) => ApiError::conflict("DuplicateCorrelationId", message),
            OrderError::Ledger(e) => e.into(),
        }
    }
}

impl From<WithdrawalError> for ApiError {
    fn from(err: WithdrawalError) -> Self {
        let message = err.to_string();
        match err {
            WithdrawalError::InvalidRequest(_) => ApiError::validation("InvalidRequest", message),
            WithdrawalError::UnsupportedAsset(asset) => {
                ApiError::validation("UnsupportedAsset", message).with_detail("asset", asset)
            }
            WithdrawalError::InvalidPinFormat(_) => ApiError::validation("InvalidPin", message),
            WithdrawalError::BelowMinimum { asset, minimum } => ApiError::business("BelowMinimum", message)
                .with_detail("asset", asset)
                .with_detail("minimum", minimum),
            WithdrawalError::InsufficientBalance { asset, required } => {
                ApiError::business("InsufficientBalance", message)
                    .with_detail("asset", asset)
                    .with_detail("required", required)
            }
            WithdrawalError::InvalidPin { remaining_attempts } => {
                ApiError::forbidden("InvalidPin", message).with_detail("remainingAttempts", remaining_attempts)
            }
            WithdrawalError::PinLocked { retry_after_secs } => {
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "PinLocked", message)
                    .with_detail("retryAfterSecs", retry_after_secs)
            }
            WithdrawalError::PinNotSet(_) => ApiError::business("PinNotSet", message),
            WithdrawalError::PinAlreadySet(_) => ApiError::conflict("PinAlreadySet", message),
            WithdrawalError::DuplicateRequest(_) => ApiError::conflict("DuplicateRequest", message),
            WithdrawalError::RequestNotFound(_) => ApiError::not_found("RequestNotFound", message),
            WithdrawalError::AccountClosed(_) => ApiError::conflict("AccountClosed", message),
            WithdrawalError::InvalidState(_) => ApiError::conflict("InvalidState", message),
            WithdrawalError::PinStore(_) => ApiError::internal(message),
            WithdrawalError::Ledger(e) => e.into(),
        }
    }
}

impl From<ValuationError> for ApiError {
    fn from(err: ValuationError) -> Self {
        let message = err.to_string();
        match err {
            ValuationError::StalePrice { symbol, as_of } => ApiError::unavailable("StalePrice", message)
                .with_detail("symbol", symbol)
                .with_detail("asOf", as_of),
            ValuationError::PriceUnavailable { symbol, .. } => {
                ApiError::unavailable("PriceUnavailable", message).with_detail("symbol", symbol)
            }
        }
    }
}

impl From<DepositError> for ApiError {
    fn from(err: DepositError) -> Self {
        let message = err.to_string();
        match err {
            DepositError::InvalidDeposit(_) => ApiError::validation("InvalidDeposit", message),
            DepositError::UnsupportedAsset(asset) => {
                ApiError::validation("UnsupportedAsset", message).with_detail("asset", asset)
            }
            DepositError::MethodNotAllowed { .. } => ApiError::validation("MethodNotAllowed", message),
            DepositError::AwaitingConfirmations { required, received } => {
                ApiError::business("AwaitingConfirmations", message)
                    .with_detail("required", required)
                    .with_detail("received", received)
            }
            DepositError::AmountBelowFee { fee, .. } => {
                ApiError::business("AmountBelowFee", message).with_detail("fee", fee)
            }
            DepositError::PriceUnavailable { symbol, .. } => {
                ApiError::unavailable("PriceUnavailable", message).with_detail("symbol", symbol)
            }
            DepositError::StalePrice { symbol, as_of } => ApiError::unavailable("StalePrice", message)
                .with_detail("symbol", symbol)
                .with_detail("asOf", as_of),
            DepositError::CorrelationConflict(_) => ApiError::conflict("DuplicateCorrelationId", message),
            DepositError::Ledger(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Ledger(e) => e.into(),
            AccountError::Withdrawal(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinvault_core::{AccountId, Asset};
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_per_category() {
        let locked: ApiError = WithdrawalError::PinLocked { retry_after_secs: 900 }.into();
        assert_eq!(locked.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(locked.detail["retryAfterSecs"], 900);

        let wrong: ApiError = WithdrawalError::InvalidPin { remaining_attempts: 2 }.into();
        assert_eq!(wrong.status, StatusCode::FORBIDDEN);

        let format: ApiError = WithdrawalError::InvalidPinFormat(6).into();
        assert_eq!(format.status, StatusCode::BAD_REQUEST);

        let not_empty: ApiError = LedgerError::AccountNotEmpty(AccountId::from("alice")).into();
        assert_eq!(not_empty.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(not_empty.code, "AccountNotEmpty");

        let stale: ApiError = ValuationError::PriceUnavailable {
            symbol: Asset::usd(),
            reason: "down".into(),
        }
        .into();
        assert_eq!(stale.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_ledger_detail_is_carried() {
        let err: ApiError = LedgerError::InsufficientBalance {
            asset: Asset::usd(),
            available: dec!(10),
            requested: dec!(25),
        }
        .into();

        assert_eq!(err.code, "InsufficientBalance");
        assert_eq!(err.detail["asset"], "USD");
        assert_eq!(err.detail["requested"], "25");
    }

    #[test]
    fn test_replay_mismatch_is_internal() {
        let err: ApiError = LedgerError::ReplayMismatch {
            account_id: AccountId::from("alice"),
            asset: Asset::usd(),
            live: dec!(1),
            replayed: dec!(2),
        }
        .into();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "ReplayMismatch");
    }
}

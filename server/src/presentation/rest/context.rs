use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use coinvault_core::AccountId;

use super::ApiError;

/// Header the upstream session layer sets to the authenticated account
pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// The account a request acts for
///
/// Handlers take this instead of reading headers so the account is an
/// explicit argument of every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: AccountId,
}

impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACCOUNT_HEADER)
            .ok_or_else(|| ApiError::unauthenticated(format!("Missing {} header", ACCOUNT_HEADER)))?;

        let id = value
            .to_str()
            .map(str::trim)
            .map_err(|_| ApiError::unauthenticated(format!("{} is not valid text", ACCOUNT_HEADER)))?;
        if id.is_empty() {
            return Err(ApiError::unauthenticated(format!("{} is empty", ACCOUNT_HEADER)));
        }

        Ok(AccountContext {
            account_id: AccountId::from(id),
        })
    }
}

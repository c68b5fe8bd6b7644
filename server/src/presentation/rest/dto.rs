use std::collections::BTreeMap;

use coinvault_core::{
    AccountId, AccountStatus, Amount, Asset, AssetBalance, DepositMethod, Destination, LedgerEntry, Order, OrderKind,
    Price, SequenceNumber, Side, Trade,
};
use coinvault_ledger::ReplayReport;
use coinvault_order_engine::{SubmitOrderResult, TradingPair};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::{AccountSummary, DepositReceipt};

/// Error body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub msg: String,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAccountRequest {
    #[serde(default)]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: AccountId,
    pub status: AccountStatus,
    pub balances: BTreeMap<Asset, AssetBalance>,
    pub has_pin: bool,
}

impl From<AccountSummary> for AccountResponse {
    fn from(summary: AccountSummary) -> Self {
        AccountResponse {
            account_id: summary.snapshot.account_id,
            status: summary.snapshot.status,
            balances: summary.snapshot.balances,
            has_pin: summary.has_pin,
        }
    }
}

// ============================================================================
// Trading
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// "BTC" or "BTC/USD"
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type", default)]
    pub kind: Option<OrderKind>,
    pub amount: Amount,
    #[serde(default)]
    pub limit_price: Option<Price>,
    #[serde(default)]
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
    pub replayed: bool,
}

impl From<SubmitOrderResult> for OrderResponse {
    fn from(result: SubmitOrderResult) -> Self {
        OrderResponse {
            order: result.order,
            trade: result.trade,
            replayed: result.replayed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingPairResponse {
    pub symbol: String,
    pub base: Asset,
    pub quote: Asset,
}

impl From<TradingPair> for TradingPairResponse {
    fn from(pair: TradingPair) -> Self {
        TradingPairResponse {
            symbol: pair.symbol(),
            base: pair.base,
            quote: pair.quote,
        }
    }
}

// ============================================================================
// Portfolio
// ============================================================================

/// Manual ledger entry; a negative amount is a debit
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualEntryRequest {
    pub asset: String,
    pub amount: Amount,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub entry: LedgerEntry,
    pub replayed: bool,
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub asset: String,
    pub amount: Amount,
    pub method: DepositMethod,
    #[serde(default)]
    pub confirmations: u32,
    /// Transaction hash or payment reference
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub entry: LedgerEntry,
    pub fee: Amount,
    pub replayed: bool,
}

impl From<DepositReceipt> for DepositResponse {
    fn from(receipt: DepositReceipt) -> Self {
        DepositResponse {
            entry: receipt.entry,
            fee: receipt.fee,
            replayed: receipt.replayed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    pub asset: String,
    pub amount: Amount,
    pub destination: Destination,
    pub pin: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
}

/// First PIN when `current_pin` is absent, otherwise a change
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    #[serde(default)]
    pub current_pin: Option<String>,
    pub pin: String,
}

// ============================================================================
// Admin
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReportResponse {
    pub account_id: AccountId,
    pub entries: usize,
    pub last_sequence: SequenceNumber,
    pub totals: BTreeMap<Asset, Amount>,
}

impl From<ReplayReport> for ReplayReportResponse {
    fn from(report: ReplayReport) -> Self {
        ReplayReportResponse {
            account_id: report.account_id,
            entries: report.entries,
            last_sequence: report.last_sequence,
            totals: report.totals,
        }
    }
}

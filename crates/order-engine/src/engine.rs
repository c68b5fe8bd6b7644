use std::sync::Arc;

use coinvault_core::{
    AccountId, AuditEvent, AuditKind, CorrelationId, EntryReason, LedgerEntry, Order, OrderId, OrderKind, Price,
    RejectReason, Side, Trade,
};
use coinvault_journal::AuditLog;
use coinvault_ledger::{AccountLedger, LedgerError, Settlement};
use coinvault_ports::{Clock, MarketDataProvider, PriceQuote};
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::command::{SubmitOrderCommand, SubmitOrderResult, TradingPair};
use crate::config::EngineConfig;
use crate::error::{OrderError, Result};
use crate::repository::InMemoryOrderRepository;

/// Fills market and limit orders against the reference price
pub struct OrderEngine {
    ledger: Arc<AccountLedger>,
    market_data: Arc<dyn MarketDataProvider>,
    orders: Arc<InMemoryOrderRepository>,
    audit: Arc<AuditLog>,
    config: EngineConfig,
}

impl OrderEngine {
    pub fn new(
        ledger: Arc<AccountLedger>,
        market_data: Arc<dyn MarketDataProvider>,
        audit: Arc<AuditLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            ledger,
            market_data,
            orders: Arc::new(InMemoryOrderRepository::new()),
            audit,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn clock(&self) -> &Arc<dyn Clock> {
        self.ledger.clock()
    }

    /// Validate, price and fill an order in full, or reject it
    pub async fn submit(&self, account_id: &AccountId, command: SubmitOrderCommand) -> Result<SubmitOrderResult> {
        self.validate(&command)?;

        let candidate = Order::new(
            account_id.clone(),
            command.symbol,
            command.side,
            command.kind,
            command.amount,
            command.limit_price,
            command.client_order_id.map(CorrelationId::new),
            self.clock().now(),
        );
        let order = match self.orders.insert_if_absent(candidate) {
            Ok(order) => order,
            Err(existing) => {
                debug!("Order {} resubmitted under {}", existing.id, existing.correlation_id);
                return Ok(self.result_for(existing, true));
            }
        };

        // No account section is held while waiting on the price source
        let quote = match self.reference_price(&order).await {
            Ok(quote) => quote,
            Err(reason) => return Ok(self.reject(&order, reason)),
        };
        if !order.accepts_price(quote.price) {
            return Ok(self.reject(&order, RejectReason::PriceNotMet));
        }
        let price = quote.price;
        let Some((total, fee)) = costs(order.amount, price, self.config.fee_rate) else {
            self.orders.remove(&order.id);
            return Err(OrderError::InvalidOrder(format!(
                "{} {} at {} is beyond representable value",
                order.amount, order.symbol, price
            )));
        };

        let mut guard = self.ledger.lock(account_id).await;

        // A cancel may have landed while the price was being fetched
        let order = match self.orders.get(&order.id) {
            Some(current) if !current.is_terminal() => current,
            Some(current) => return Ok(self.result_for(current, false)),
            None => return Err(OrderError::OrderNotFound(order.id)),
        };

        // Journal already holds this fill (order history was lost on restart)
        if let Some(entries) = guard.committed(&order.correlation_id) {
            return self.adopt_journaled(order, entries);
        }

        let quote_asset = self.config.assets.quote().clone();

        let (reserve_asset, reserve_amount, shortfall, settlement) = match order.side {
            Side::Buy => (
                quote_asset,
                total + fee,
                RejectReason::InsufficientFunds,
                Settlement::debit(order.correlation_id.clone(), total + fee, EntryReason::TradeDebit)
                    .with_credit(order.symbol.clone(), order.amount, EntryReason::TradeCredit)
                    .at_price(price),
            ),
            Side::Sell => (
                order.symbol.clone(),
                order.amount,
                RejectReason::InsufficientHoldings,
                Settlement::debit(order.correlation_id.clone(), order.amount, EntryReason::TradeDebit)
                    .with_credit(quote_asset, total - fee, EntryReason::TradeCredit)
                    .at_price(price),
            ),
        };

        let token = match guard.reserve(&reserve_asset, reserve_amount) {
            Ok(token) => token,
            Err(LedgerError::InsufficientBalance { .. }) => return Ok(self.reject(&order, shortfall)),
            Err(e) => {
                self.orders.remove(&order.id);
                return Err(e.into());
            }
        };

        match guard.commit(token, settlement) {
            Ok(_) => {}
            Err(LedgerError::DuplicateCorrelationId { original, .. }) => return self.adopt_journaled(order, original),
            Err(e) => {
                warn!("Order {} could not be committed: {}", order.id, e);
                self.orders.remove(&order.id);
                return Err(e.into());
            }
        }

        let now = self.clock().now();
        let trade = Trade::new(
            order.id,
            account_id.clone(),
            order.symbol.clone(),
            order.side,
            price,
            order.amount,
            fee,
            now,
        );
        self.orders.record_trade(trade.clone());
        let filled = self.transition(&order.id, |o| o.fill(now)).unwrap_or(order);
        drop(guard);

        info!(
            "Filled {} {} {} @ {} for {} (fee {})",
            filled.side, filled.amount, filled.symbol, price, account_id, fee
        );
        Ok(SubmitOrderResult {
            order: filled,
            trade: Some(trade),
            replayed: false,
        })
    }

    /// Cancel an order that has not reached a terminal state
    pub async fn cancel(&self, account_id: &AccountId, order_id: OrderId) -> Result<Order> {
        // Same section as the fill, so a cancel and a fill never interleave
        let _guard = self.ledger.lock(account_id).await;

        let order = self
            .orders
            .get(&order_id)
            .filter(|o| &o.account_id == account_id)
            .ok_or(OrderError::OrderNotFound(order_id))?;
        if order.is_terminal() {
            return Err(OrderError::InvalidState {
                order_id,
                status: order.status,
            });
        }

        let now = self.clock().now();
        let cancelled = self
            .transition(&order_id, |o| o.cancel(now))
            .ok_or(OrderError::InvalidState {
                order_id,
                status: order.status,
            })?;

        self.audit.record(
            AuditEvent::new(account_id.clone(), AuditKind::OrderCancelled, format!("order {order_id}"), now)
                .with_correlation(cancelled.correlation_id.clone()),
        );
        info!("Cancelled order {} for {}", order_id, account_id);
        Ok(cancelled)
    }

    /// Orders of the account, oldest first
    pub fn orders(&self, account_id: &AccountId) -> Vec<Order> {
        self.orders.by_account(account_id)
    }

    pub fn order(&self, account_id: &AccountId, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(&order_id)
            .filter(|o| &o.account_id == account_id)
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Fills of the account, oldest first
    pub fn trades(&self, account_id: &AccountId) -> Vec<Trade> {
        self.orders.trades_by_account(account_id)
    }

    pub fn trading_pairs(&self) -> Vec<TradingPair> {
        let quote = self.config.assets.quote();
        self.config
            .assets
            .tradable()
            .map(|base| TradingPair {
                base: base.clone(),
                quote: quote.clone(),
            })
            .collect()
    }

    fn validate(&self, command: &SubmitOrderCommand) -> Result<()> {
        let assets = &self.config.assets;
        if &command.symbol == assets.quote() || !assets.is_supported(&command.symbol) {
            return Err(OrderError::UnsupportedSymbol(command.symbol.clone()));
        }
        if command.amount <= Decimal::ZERO {
            return Err(OrderError::InvalidOrder(format!("amount must be positive, got {}", command.amount)));
        }
        if let Some(id) = command.client_order_id.as_deref() {
            if CorrelationId::new(id).is_derived() {
                return Err(OrderError::InvalidOrder(format!(
                    "client order id {id} uses the reserved separator '{}'",
                    CorrelationId::DERIVED_SEPARATOR
                )));
            }
        }
        match (command.kind, command.limit_price) {
            (OrderKind::Market, Some(_)) => Err(OrderError::InvalidOrder(
                "market orders do not take a limit price".to_string(),
            )),
            (OrderKind::Limit, None) => Err(OrderError::InvalidOrder("limit orders need a limit price".to_string())),
            (OrderKind::Limit, Some(limit)) if limit <= Decimal::ZERO => Err(OrderError::InvalidOrder(format!(
                "limit price must be positive, got {limit}"
            ))),
            _ => Ok(()),
        }
    }

    async fn reference_price(&self, order: &Order) -> std::result::Result<PriceQuote, RejectReason> {
        let quote = match self.market_data.reference_price(&order.symbol).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!("No price for {} from {}: {}", order.symbol, self.market_data.name(), e);
                return Err(RejectReason::PriceUnavailable);
            }
        };
        if quote.price <= Decimal::ZERO {
            warn!("Non-positive price {} for {}", quote.price, order.symbol);
            return Err(RejectReason::PriceUnavailable);
        }
        if quote.is_stale(self.clock().now(), self.config.max_price_age) {
            warn!("Stale price for {} (as of {})", order.symbol, quote.as_of);
            return Err(RejectReason::StalePrice);
        }
        Ok(quote)
    }

    /// Mark the order rejected and audit it; balances are untouched
    fn reject(&self, order: &Order, reason: RejectReason) -> SubmitOrderResult {
        let now = self.clock().now();
        match self.transition(&order.id, |o| o.reject(reason, now)) {
            Some(rejected) => {
                self.audit.record(
                    AuditEvent::new(
                        order.account_id.clone(),
                        AuditKind::OrderRejected,
                        format!("{} {} {}: {}", order.side, order.amount, order.symbol, reason.code()),
                        now,
                    )
                    .with_correlation(order.correlation_id.clone()),
                );
                info!("Rejected order {} for {}: {}", order.id, order.account_id, reason);
                self.result_for(rejected, false)
            }
            // Already terminal; report what is stored
            None => self.result_for(self.orders.get(&order.id).unwrap_or_else(|| order.clone()), false),
        }
    }

    /// Fill the order from entries the journal already holds
    fn adopt_journaled(&self, order: Order, entries: Vec<LedgerEntry>) -> Result<SubmitOrderResult> {
        let Some(trade) = reconstruct_trade(&order, &entries, self.config.assets.quote()) else {
            // Another operation owns the id; drop the order so it is not left pending
            self.orders.remove(&order.id);
            warn!("Order {} collides with journaled {}", order.id, order.correlation_id);
            return Err(OrderError::CorrelationConflict(order.correlation_id));
        };
        self.orders.record_trade(trade.clone());
        let filled = self
            .transition(&order.id, |o| o.fill(trade.timestamp))
            .unwrap_or(order);
        debug!("Order {} adopted from journal", filled.id);
        Ok(SubmitOrderResult {
            order: filled,
            trade: Some(trade),
            replayed: true,
        })
    }

    fn transition(
        &self,
        order_id: &OrderId,
        f: impl FnOnce(&mut Order) -> std::result::Result<(), coinvault_core::TransitionError>,
    ) -> Option<Order> {
        match self.orders.modify(order_id, |o| f(o).map(|_| o.clone())) {
            Some(Ok(order)) => Some(order),
            Some(Err(e)) => {
                debug!("{}", e);
                None
            }
            None => None,
        }
    }

    fn result_for(&self, order: Order, replayed: bool) -> SubmitOrderResult {
        SubmitOrderResult {
            trade: self.orders.trade_for(&order.id),
            order,
            replayed,
        }
    }
}

/// Notional and fee; `None` when `notional + fee` does not fit a `Decimal`
fn costs(amount: Decimal, price: Price, fee_rate: Decimal) -> Option<(Decimal, Decimal)> {
    let total = amount.checked_mul(price)?;
    let fee = total.checked_mul(fee_rate)?;
    total.checked_add(fee)?;
    Some((total, fee))
}

/// Rebuild the fill from its two journal legs
fn reconstruct_trade(order: &Order, entries: &[LedgerEntry], quote_asset: &coinvault_core::Asset) -> Option<Trade> {
    let base = entries.iter().find(|e| e.asset == order.symbol)?;
    let quote = entries.iter().find(|e| &e.asset == quote_asset)?;
    if base.reason != EntryReason::TradeDebit && base.reason != EntryReason::TradeCredit {
        return None;
    }

    let price: Price = base.price?;
    let amount = base.delta.abs();
    let notional = amount.checked_mul(price)?;
    let fee = match order.side {
        Side::Buy => -quote.delta - notional,
        Side::Sell => notional - quote.delta,
    };

    Some(Trade::new(
        order.id,
        order.account_id.clone(),
        order.symbol.clone(),
        order.side,
        price,
        amount,
        fee,
        base.timestamp,
    ))
}

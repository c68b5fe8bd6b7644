use coinvault_core::{AccountId, CorrelationId, Order, OrderId, Trade};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// In-memory store of orders and fills
///
/// Orders are indexed by id and by (account, correlation id); the second
/// index is the idempotency key. The journal stays the authority for
/// balances, so losing this store only loses order history.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: DashMap<OrderId, Order>,
    by_correlation: DashMap<(AccountId, CorrelationId), OrderId>,
    trades: DashMap<OrderId, Trade>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the idempotency key is taken; `Err` carries the holder
    pub fn insert_if_absent(&self, order: Order) -> Result<Order, Order> {
        let key = (order.account_id.clone(), order.correlation_id.clone());
        match self.by_correlation.entry(key) {
            Entry::Occupied(mut slot) => {
                if let Some(existing) = self.orders.get(slot.get()) {
                    return Err(existing.clone());
                }
                slot.insert(order.id);
            }
            Entry::Vacant(slot) => {
                slot.insert(order.id);
            }
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.orders.get(id).map(|o| o.clone())
    }

    /// Apply `f` to the stored order atomically
    pub fn modify<R>(&self, id: &OrderId, f: impl FnOnce(&mut Order) -> R) -> Option<R> {
        self.orders.get_mut(id).map(|mut order| f(&mut order))
    }

    /// Forget an order that never reached a terminal state
    pub fn remove(&self, id: &OrderId) -> Option<Order> {
        let (_, order) = self.orders.remove(id)?;
        self.by_correlation
            .remove_if(&(order.account_id.clone(), order.correlation_id.clone()), |_, v| v == id);
        Some(order)
    }

    /// Orders of one account, oldest first
    pub fn by_account(&self, account_id: &AccountId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|o| &o.account_id == account_id)
            .map(|o| o.clone())
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }

    pub fn record_trade(&self, trade: Trade) {
        self.trades.insert(trade.order_id, trade);
    }

    pub fn trade_for(&self, order_id: &OrderId) -> Option<Trade> {
        self.trades.get(order_id).map(|t| t.clone())
    }

    /// Fills of one account, oldest first
    pub fn trades_by_account(&self, account_id: &AccountId) -> Vec<Trade> {
        let mut trades: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| &t.account_id == account_id)
            .map(|t| t.clone())
            .collect();
        trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        trades
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

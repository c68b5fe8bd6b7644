use coinvault_core::{AccountId, CorrelationId, WithdrawalId, WithdrawalRequest, WithdrawalStatus};
use dashmap::DashMap;

/// In-memory store of withdrawal requests
///
/// Callers hold the account section while touching an account's requests,
/// so lookups and inserts for one account never race.
#[derive(Debug, Default)]
pub struct InMemoryWithdrawalRepository {
    requests: DashMap<WithdrawalId, WithdrawalRequest>,
    by_correlation: DashMap<(AccountId, CorrelationId), WithdrawalId>,
}

impl InMemoryWithdrawalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request holding the idempotency key, unless it was rejected
    ///
    /// A rejected request does not block a retry under the same key.
    pub fn active_by_correlation(
        &self,
        account_id: &AccountId,
        correlation_id: &CorrelationId,
    ) -> Option<WithdrawalRequest> {
        let id = *self
            .by_correlation
            .get(&(account_id.clone(), correlation_id.clone()))?;
        self.get(&id).filter(|r| r.status != WithdrawalStatus::Rejected)
    }

    pub fn insert(&self, request: WithdrawalRequest) {
        self.by_correlation.insert(
            (request.account_id.clone(), request.correlation_id.clone()),
            request.id,
        );
        self.requests.insert(request.id, request);
    }

    pub fn get(&self, id: &WithdrawalId) -> Option<WithdrawalRequest> {
        self.requests.get(id).map(|r| r.clone())
    }

    /// Apply `f` to the stored request atomically
    pub fn modify<R>(&self, id: &WithdrawalId, f: impl FnOnce(&mut WithdrawalRequest) -> R) -> Option<R> {
        self.requests.get_mut(id).map(|mut request| f(&mut request))
    }

    /// Requests of one account, oldest first
    pub fn by_account(&self, account_id: &AccountId) -> Vec<WithdrawalRequest> {
        let mut requests: Vec<WithdrawalRequest> = self
            .requests
            .iter()
            .filter(|r| &r.account_id == account_id)
            .map(|r| r.clone())
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        requests
    }
}

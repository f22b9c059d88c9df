//! In-memory withdrawal repository

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::WithdrawalRepository;
use crate::domain::{WalletId, Withdrawal, WithdrawalId, WithdrawalStatus};

pub struct InMemoryWithdrawalRepository {
    withdrawals: Arc<DashMap<WithdrawalId, Withdrawal>>,
}

impl InMemoryWithdrawalRepository {
    pub fn new() -> Self {
        Self {
            withdrawals: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryWithdrawalRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryWithdrawalRepository {
    fn clone(&self) -> Self {
        Self {
            withdrawals: Arc::clone(&self.withdrawals),
        }
    }
}

#[async_trait]
impl WithdrawalRepository for InMemoryWithdrawalRepository {
    async fn get(&self, id: WithdrawalId) -> Option<Withdrawal> {
        self.withdrawals.get(&id).map(|w| w.value().clone())
    }

    async fn save(&self, withdrawal: Withdrawal) {
        self.withdrawals.insert(withdrawal.id, withdrawal);
    }

    async fn list_for_wallet(&self, wallet_id: WalletId) -> Vec<Withdrawal> {
        self.withdrawals
            .iter()
            .filter(|w| w.wallet_id == wallet_id)
            .map(|w| w.value().clone())
            .collect()
    }

    async fn get_by_status(&self, status: WithdrawalStatus) -> Vec<Withdrawal> {
        self.withdrawals
            .iter()
            .filter(|w| w.status == status)
            .map(|w| w.value().clone())
            .collect()
    }

    async fn get_inflight(&self) -> Vec<Withdrawal> {
        self.withdrawals
            .iter()
            .filter(|w| !w.is_terminal())
            .map(|w| w.value().clone())
            .collect()
    }
}

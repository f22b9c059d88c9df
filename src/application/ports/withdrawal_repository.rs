//! Port for withdrawal storage

use async_trait::async_trait;

use crate::domain::{Withdrawal, WithdrawalId, WithdrawalStatus, WalletId};

#[async_trait]
pub trait WithdrawalRepository: Send + Sync {
    /// Get a withdrawal by ID
    async fn get(&self, id: WithdrawalId) -> Option<Withdrawal>;

    /// Save a withdrawal (insert or update)
    async fn save(&self, withdrawal: Withdrawal);

    /// All withdrawals for a wallet
    async fn list_for_wallet(&self, wallet_id: WalletId) -> Vec<Withdrawal>;

    /// Withdrawals in a given status
    async fn get_by_status(&self, status: WithdrawalStatus) -> Vec<Withdrawal>;

    /// Non-terminal withdrawals (PENDING or PROCESSING), for startup recovery
    async fn get_inflight(&self) -> Vec<Withdrawal>;
}

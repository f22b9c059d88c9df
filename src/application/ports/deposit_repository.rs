//! Port for deposit storage
//!
//! The store guarantees a unique constraint on (tx_hash, currency), the
//! idempotency key for external deposit events.

use async_trait::async_trait;

use crate::domain::{Currency, Deposit, DepositId, WalletId};

/// Outcome of a unique insert attempt
#[derive(Debug, Clone)]
pub enum DepositInsert {
    /// No row existed for this (tx_hash, currency); the deposit was stored
    Created(Deposit),
    /// A row already existed; carries the stored row, the attempted insert
    /// was discarded
    Duplicate(Deposit),
}

#[async_trait]
pub trait DepositRepository: Send + Sync {
    /// Get a deposit by ID
    async fn get(&self, id: DepositId) -> Option<Deposit>;

    /// Look up a deposit by its external identity
    async fn find_by_tx(&self, tx_hash: &str, currency: &Currency) -> Option<Deposit>;

    /// Insert honoring the (tx_hash, currency) unique constraint
    async fn insert_unique(&self, deposit: Deposit) -> DepositInsert;

    /// Update an existing deposit
    async fn save(&self, deposit: Deposit);

    /// All deposits recorded against a wallet
    async fn list_for_wallet(&self, wallet_id: WalletId) -> Vec<Deposit>;
}

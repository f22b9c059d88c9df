//! In-memory deposit repository
//!
//! The (tx_hash, currency) unique constraint is enforced through the index
//! entry API: whichever channel inserts first wins, the loser gets the
//! stored row back.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::application::ports::{DepositInsert, DepositRepository};
use crate::domain::{Currency, Deposit, DepositId, WalletId};

pub struct InMemoryDepositRepository {
    deposits: Arc<DashMap<DepositId, Deposit>>,
    /// Index: (tx_hash, currency) -> deposit_id
    tx_index: Arc<DashMap<(String, Currency), DepositId>>,
}

impl InMemoryDepositRepository {
    pub fn new() -> Self {
        Self {
            deposits: Arc::new(DashMap::new()),
            tx_index: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryDepositRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryDepositRepository {
    fn clone(&self) -> Self {
        Self {
            deposits: Arc::clone(&self.deposits),
            tx_index: Arc::clone(&self.tx_index),
        }
    }
}

#[async_trait]
impl DepositRepository for InMemoryDepositRepository {
    async fn get(&self, id: DepositId) -> Option<Deposit> {
        self.deposits.get(&id).map(|d| d.value().clone())
    }

    async fn find_by_tx(&self, tx_hash: &str, currency: &Currency) -> Option<Deposit> {
        let key = (tx_hash.to_string(), currency.clone());
        let id = *self.tx_index.get(&key)?;
        self.deposits.get(&id).map(|d| d.value().clone())
    }

    async fn insert_unique(&self, deposit: Deposit) -> DepositInsert {
        let key = (deposit.tx_hash.clone(), deposit.currency.clone());
        match self.tx_index.entry(key) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                drop(existing);
                match self.deposits.get(&id) {
                    Some(stored) => DepositInsert::Duplicate(stored.value().clone()),
                    None => DepositInsert::Duplicate(deposit),
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(deposit.id);
                self.deposits.insert(deposit.id, deposit.clone());
                DepositInsert::Created(deposit)
            }
        }
    }

    async fn save(&self, deposit: Deposit) {
        self.tx_index.insert(
            (deposit.tx_hash.clone(), deposit.currency.clone()),
            deposit.id,
        );
        self.deposits.insert(deposit.id, deposit);
    }

    async fn list_for_wallet(&self, wallet_id: WalletId) -> Vec<Deposit> {
        self.deposits
            .iter()
            .filter(|d| d.wallet_id == wallet_id)
            .map(|d| d.value().clone())
            .collect()
    }
}

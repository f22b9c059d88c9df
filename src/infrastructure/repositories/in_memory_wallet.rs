//! In-memory wallet repository
//!
//! Thread-safe storage using DashMap. Each atomic balance operation runs
//! under the wallet's map entry lock, giving the single-writer-per-wallet
//! guarantee the ports contract requires.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::application::ports::WalletRepository;
use crate::domain::{Currency, Wallet, WalletError, WalletId};

pub struct InMemoryWalletRepository {
    /// Wallets by ID
    wallets: Arc<DashMap<WalletId, Wallet>>,
    /// Index: address -> wallet_id (addresses are globally unique)
    address_index: Arc<DashMap<String, WalletId>>,
    /// Index: memo -> wallet_id (memos are globally unique)
    memo_index: Arc<DashMap<String, WalletId>>,
    /// Index: (tenant, user, currency) -> wallet_id
    owner_index: Arc<DashMap<(String, String, Currency), WalletId>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self {
            wallets: Arc::new(DashMap::new()),
            address_index: Arc::new(DashMap::new()),
            memo_index: Arc::new(DashMap::new()),
            owner_index: Arc::new(DashMap::new()),
        }
    }

    fn owner_key(wallet: &Wallet) -> (String, String, Currency) {
        (
            wallet.tenant_id.clone(),
            wallet.user_id.clone(),
            wallet.currency.clone(),
        )
    }

    fn with_wallet<F>(&self, id: WalletId, mutate: F) -> Result<Wallet, WalletError>
    where
        F: FnOnce(&mut Wallet) -> Result<(), WalletError>,
    {
        let mut entry = self.wallets.get_mut(&id).ok_or(WalletError::NotFound(id))?;
        mutate(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

impl Default for InMemoryWalletRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryWalletRepository {
    fn clone(&self) -> Self {
        Self {
            wallets: Arc::clone(&self.wallets),
            address_index: Arc::clone(&self.address_index),
            memo_index: Arc::clone(&self.memo_index),
            owner_index: Arc::clone(&self.owner_index),
        }
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn get(&self, id: WalletId) -> Option<Wallet> {
        self.wallets.get(&id).map(|w| w.value().clone())
    }

    async fn find_by_owner(
        &self,
        tenant_id: &str,
        user_id: &str,
        currency: &Currency,
    ) -> Option<Wallet> {
        let key = (
            tenant_id.to_string(),
            user_id.to_string(),
            currency.clone(),
        );
        let id = *self.owner_index.get(&key)?;
        self.wallets.get(&id).map(|w| w.value().clone())
    }

    async fn find_by_memo(&self, memo: &str, currency: &Currency) -> Option<Wallet> {
        let id = *self.memo_index.get(memo)?;
        let wallet = self.wallets.get(&id)?.value().clone();
        (wallet.currency == *currency).then_some(wallet)
    }

    async fn find_by_address(&self, address: &str) -> Option<Wallet> {
        let id = *self.address_index.get(address)?;
        self.wallets.get(&id).map(|w| w.value().clone())
    }

    async fn list_for_user(&self, tenant_id: &str, user_id: &str) -> Vec<Wallet> {
        self.wallets
            .iter()
            .filter(|w| w.tenant_id == tenant_id && w.user_id == user_id)
            .map(|w| w.value().clone())
            .collect()
    }

    async fn upsert_by_address(&self, wallet: Wallet) -> Wallet {
        match self.address_index.entry(wallet.address.clone()) {
            // Unique constraint hit: keep the stored row untouched
            Entry::Occupied(existing) => {
                let id = *existing.get();
                drop(existing);
                self.wallets
                    .get(&id)
                    .map(|w| w.value().clone())
                    .unwrap_or(wallet)
            }
            Entry::Vacant(slot) => {
                slot.insert(wallet.id);
                if let Some(memo) = &wallet.deposit_memo {
                    self.memo_index.insert(memo.clone(), wallet.id);
                }
                self.owner_index.insert(Self::owner_key(&wallet), wallet.id);
                self.wallets.insert(wallet.id, wallet.clone());
                wallet
            }
        }
    }

    async fn set_memo(&self, id: WalletId, memo: &str) -> Result<Wallet, WalletError> {
        let updated = self.with_wallet(id, |w| {
            w.deposit_memo = Some(memo.to_string());
            Ok(())
        })?;
        self.memo_index.insert(memo.to_string(), id);
        Ok(updated)
    }

    async fn set_active(&self, id: WalletId, active: bool) -> Result<Wallet, WalletError> {
        self.with_wallet(id, |w| {
            w.is_active = active;
            Ok(())
        })
    }

    async fn credit_deposit(&self, id: WalletId, amount: Decimal) -> Result<Wallet, WalletError> {
        self.with_wallet(id, |w| w.apply_deposit(amount))
    }

    async fn lock_for_withdrawal(
        &self,
        id: WalletId,
        amount: Decimal,
    ) -> Result<Wallet, WalletError> {
        self.with_wallet(id, |w| w.lock(amount))
    }

    async fn settle_withdrawal(
        &self,
        id: WalletId,
        amount: Decimal,
    ) -> Result<Wallet, WalletError> {
        self.with_wallet(id, |w| w.settle(amount))
    }

    async fn release_locked(&self, id: WalletId, amount: Decimal) -> Result<Wallet, WalletError> {
        self.with_wallet(id, |w| w.release(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_wallet(address: &str, memo: &str) -> Wallet {
        Wallet::new("guild42", "1001", Currency::new("USDT"), address, memo)
    }

    #[tokio::test]
    async fn test_upsert_respects_address_uniqueness() {
        let repo = InMemoryWalletRepository::new();

        let first = repo
            .upsert_by_address(make_wallet("addr-1", "CLDG-1001-guild42-aaaaaaaa"))
            .await;
        let second = repo
            .upsert_by_address(make_wallet("addr-1", "CLDG-1001-guild42-bbbbbbbb"))
            .await;

        assert_eq!(first.id, second.id);
        assert_eq!(
            second.deposit_memo.as_deref(),
            Some("CLDG-1001-guild42-aaaaaaaa")
        );
    }

    #[tokio::test]
    async fn test_lookup_by_memo_and_address() {
        let repo = InMemoryWalletRepository::new();
        let wallet = repo
            .upsert_by_address(make_wallet("addr-1", "CLDG-1001-guild42-aaaaaaaa"))
            .await;

        let by_memo = repo
            .find_by_memo("CLDG-1001-guild42-aaaaaaaa", &Currency::new("USDT"))
            .await
            .unwrap();
        assert_eq!(by_memo.id, wallet.id);

        // Memo lookup is currency-scoped
        assert!(
            repo.find_by_memo("CLDG-1001-guild42-aaaaaaaa", &Currency::new("BTC"))
                .await
                .is_none()
        );

        let by_address = repo.find_by_address("addr-1").await.unwrap();
        assert_eq!(by_address.id, wallet.id);
    }

    #[tokio::test]
    async fn test_atomic_ops_are_guarded() {
        let repo = InMemoryWalletRepository::new();
        let wallet = repo
            .upsert_by_address(make_wallet("addr-1", "CLDG-1001-guild42-aaaaaaaa"))
            .await;

        repo.credit_deposit(wallet.id, dec!(10)).await.unwrap();
        assert!(repo.lock_for_withdrawal(wallet.id, dec!(11)).await.is_err());
        repo.lock_for_withdrawal(wallet.id, dec!(4)).await.unwrap();

        let stored = repo.get(wallet.id).await.unwrap();
        assert_eq!(stored.balance, dec!(6));
        assert_eq!(stored.locked_balance, dec!(4));
    }

    #[tokio::test]
    async fn test_concurrent_locks_never_overdraw() {
        let repo = Arc::new(InMemoryWalletRepository::new());
        let wallet = repo
            .upsert_by_address(make_wallet("addr-1", "CLDG-1001-guild42-aaaaaaaa"))
            .await;
        repo.credit_deposit(wallet.id, dec!(10)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            let id = wallet.id;
            handles.push(tokio::spawn(async move {
                repo.lock_for_withdrawal(id, dec!(3)).await.is_ok()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        // 10 / 3 -> at most 3 grants
        assert_eq!(granted, 3);
        let stored = repo.get(wallet.id).await.unwrap();
        assert_eq!(stored.balance, dec!(1));
        assert_eq!(stored.locked_balance, dec!(9));
    }
}

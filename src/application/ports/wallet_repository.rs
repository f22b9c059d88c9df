//! Port for wallet storage
//!
//! The persistence collaborator guarantees a unique constraint on `address`
//! and supports atomic field updates on the balance sheet. Every balance
//! mutation goes through one of the atomic operations below; use cases never
//! read-modify-write balances in application memory.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Currency, Wallet, WalletError, WalletId};

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Get a wallet by ID
    async fn get(&self, id: WalletId) -> Option<Wallet>;

    /// Look up the wallet for one (tenant, user, currency)
    async fn find_by_owner(
        &self,
        tenant_id: &str,
        user_id: &str,
        currency: &Currency,
    ) -> Option<Wallet>;

    /// Look up a wallet by its verification memo, scoped to a currency
    async fn find_by_memo(&self, memo: &str, currency: &Currency) -> Option<Wallet>;

    /// Look up a wallet by its globally unique deposit address
    async fn find_by_address(&self, address: &str) -> Option<Wallet>;

    /// All wallets belonging to one (tenant, user)
    async fn list_for_user(&self, tenant_id: &str, user_id: &str) -> Vec<Wallet>;

    /// Insert keyed on the unique `address`. When a concurrent call already
    /// provisioned the same address, returns the existing row untouched.
    async fn upsert_by_address(&self, wallet: Wallet) -> Wallet;

    /// Backfill a verification memo on a legacy row
    async fn set_memo(&self, id: WalletId, memo: &str) -> Result<Wallet, WalletError>;

    /// Soft-activate or deactivate a wallet
    async fn set_active(&self, id: WalletId, active: bool) -> Result<Wallet, WalletError>;

    /// Atomic: `balance += amount; total_deposited += amount`
    async fn credit_deposit(&self, id: WalletId, amount: Decimal) -> Result<Wallet, WalletError>;

    /// Atomic, balance-guarded: `balance -= amount; locked_balance += amount`
    async fn lock_for_withdrawal(
        &self,
        id: WalletId,
        amount: Decimal,
    ) -> Result<Wallet, WalletError>;

    /// Atomic: `locked_balance -= amount; total_withdrawn += amount`
    async fn settle_withdrawal(&self, id: WalletId, amount: Decimal)
    -> Result<Wallet, WalletError>;

    /// Atomic: `balance += amount; locked_balance -= amount`
    async fn release_locked(&self, id: WalletId, amount: Decimal) -> Result<Wallet, WalletError>;
}

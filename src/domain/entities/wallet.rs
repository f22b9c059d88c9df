//! Wallet entity: the balance sheet for one (tenant, user, currency)
//!
//! Balance fields only ever move through the guarded mutators below, and the
//! persistence layer applies each mutator as a single atomic update. That is
//! the sole mechanism protecting concurrent deposit confirmations and
//! withdrawal requests on the same wallet.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{Currency, Timestamp};

/// Unique identifier for a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(Uuid);

impl WalletId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet {0} not found")]
    NotFound(WalletId),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("insufficient locked balance: locked {locked}, requested {requested}")]
    InsufficientLocked { locked: Decimal, requested: Decimal },
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

/// Custodial wallet for one (tenant, user, currency[, chain])
///
/// Invariant: `balance >= 0 && locked_balance >= 0` always.
/// `total_deposited - total_withdrawn` approximates
/// `balance + locked_balance`, exact up to withdrawal fees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub tenant_id: String,
    pub user_id: String,
    pub currency: Currency,
    /// Optional network tag the address lives on
    pub chain: Option<String>,
    /// Globally unique deposit address
    pub address: String,
    /// Globally unique verification memo; `None` only on
    /// pre-verification-era records awaiting backfill
    pub deposit_memo: Option<String>,
    /// Spendable balance
    pub balance: Decimal,
    /// Funds reserved for in-flight withdrawals
    pub locked_balance: Decimal,
    /// Lifetime confirmed deposits (monotonic)
    pub total_deposited: Decimal,
    /// Lifetime settled withdrawals (monotonic)
    pub total_withdrawn: Decimal,
    pub is_active: bool,
    /// Placeholder wallet with a synthetic address; the exchange has no real
    /// deposit address for this currency, so it can never receive funds
    pub is_test_wallet: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Wallet {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        currency: Currency,
        address: impl Into<String>,
        deposit_memo: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: WalletId::new(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            currency,
            chain: None,
            address: address.into(),
            deposit_memo: Some(deposit_memo.into()),
            balance: Decimal::ZERO,
            locked_balance: Decimal::ZERO,
            total_deposited: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            is_active: true,
            is_test_wallet: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_chain(mut self, chain: impl Into<String>) -> Self {
        self.chain = Some(chain.into());
        self
    }

    pub fn as_test_wallet(mut self) -> Self {
        self.is_test_wallet = true;
        self
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// Credit a confirmed deposit: `balance += amount`,
    /// `total_deposited += amount`.
    pub fn apply_deposit(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        self.balance += amount;
        self.total_deposited += amount;
        self.touch();
        Ok(())
    }

    /// Reserve funds for a withdrawal request: `balance -= amount`,
    /// `locked_balance += amount`. `balance + locked_balance` is unchanged.
    pub fn lock(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        if amount > self.balance {
            return Err(WalletError::InsufficientBalance {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        self.locked_balance += amount;
        self.touch();
        Ok(())
    }

    /// Restore locked funds after a failed withdrawal. Exact inverse of
    /// [`Wallet::lock`].
    pub fn release(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        if amount > self.locked_balance {
            return Err(WalletError::InsufficientLocked {
                locked: self.locked_balance,
                requested: amount,
            });
        }
        self.locked_balance -= amount;
        self.balance += amount;
        self.touch();
        Ok(())
    }

    /// Consume locked funds on settlement: `locked_balance -= amount`,
    /// `total_withdrawn += amount`. Does not touch `balance`; those funds
    /// left it at request time.
    pub fn settle(&mut self, amount: Decimal) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount(amount));
        }
        if amount > self.locked_balance {
            return Err(WalletError::InsufficientLocked {
                locked: self.locked_balance,
                requested: amount,
            });
        }
        self.locked_balance -= amount;
        self.total_withdrawn += amount;
        self.touch();
        Ok(())
    }
}

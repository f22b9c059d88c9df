//! Deposit entity: one external inbound transfer
//!
//! Identity invariant: (tx_hash, currency) is unique across the ledger.
//! Reprocessing the same external event must not create a duplicate record
//! or double-credit the wallet. Status moves PENDING -> CONFIRMED exactly
//! once; CONFIRMED is terminal and re-confirming is a no-op.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::wallet::{WalletError, WalletId};
use crate::domain::value_objects::{Currency, Timestamp};

/// Unique identifier for a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositId(Uuid);

impl DepositId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DepositId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DepositId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    /// Detected, waiting for confirmations
    #[default]
    Pending,
    /// Credited to the wallet; terminal
    Confirmed,
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositStatus::Pending => write!(f, "PENDING"),
            DepositStatus::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

/// How the deposit was attributed to a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationTier {
    /// Memo matched a wallet's verification memo; highest trust, since the
    /// memo is bound to exactly one wallet
    VerifiedByMemo,
    /// Fallback match on the destination address
    VerifiedByAddress,
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationTier::VerifiedByMemo => write!(f, "VERIFIED_BY_MEMO"),
            VerificationTier::VerifiedByAddress => write!(f, "VERIFIED_BY_ADDRESS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DepositError {
    #[error("deposit {0} not found")]
    NotFound(DepositId),
    #[error("deposit {tx_hash} to {to_address} could not be attributed to any wallet")]
    Unverifiable { tx_hash: String, to_address: String },
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// One external inbound transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: DepositId,
    pub wallet_id: WalletId,
    pub tx_hash: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub status: DepositStatus,
    pub from_address: Option<String>,
    pub to_address: String,
    pub memo: Option<String>,
    pub verification: VerificationTier,
    pub created_at: Timestamp,
    pub confirmed_at: Option<Timestamp>,
}

impl Deposit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet_id: WalletId,
        tx_hash: impl Into<String>,
        currency: Currency,
        amount: Decimal,
        confirmations: u32,
        required_confirmations: u32,
        to_address: impl Into<String>,
        verification: VerificationTier,
    ) -> Self {
        Self {
            id: DepositId::new(),
            wallet_id,
            tx_hash: tx_hash.into(),
            currency,
            amount,
            confirmations,
            required_confirmations,
            status: DepositStatus::Pending,
            from_address: None,
            to_address: to_address.into(),
            memo: None,
            verification,
            created_at: chrono::Utc::now(),
            confirmed_at: None,
        }
    }

    pub fn with_from_address(mut self, from_address: impl Into<String>) -> Self {
        self.from_address = Some(from_address.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == DepositStatus::Confirmed
    }

    pub fn meets_threshold(&self) -> bool {
        self.confirmations >= self.required_confirmations
    }

    /// Transition to CONFIRMED. Returns `false` when already confirmed (the
    /// transition happens at most once).
    pub fn mark_confirmed(&mut self, now: Timestamp) -> bool {
        if self.is_confirmed() {
            return false;
        }
        self.status = DepositStatus::Confirmed;
        self.confirmed_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_deposit() -> Deposit {
        Deposit::new(
            WalletId::new(),
            "0xabc123",
            Currency::new("USDT"),
            dec!(10),
            0,
            6,
            "sim-usdt-000001",
            VerificationTier::VerifiedByMemo,
        )
    }

    #[test]
    fn test_confirm_is_monotonic() {
        let mut deposit = make_deposit();
        assert!(!deposit.is_confirmed());

        let now = chrono::Utc::now();
        assert!(deposit.mark_confirmed(now));
        assert!(deposit.is_confirmed());
        assert_eq!(deposit.confirmed_at, Some(now));

        // Second confirm is a no-op and keeps the original timestamp
        assert!(!deposit.mark_confirmed(chrono::Utc::now()));
        assert_eq!(deposit.confirmed_at, Some(now));
    }

    #[test]
    fn test_threshold() {
        let mut deposit = make_deposit();
        assert!(!deposit.meets_threshold());
        deposit.confirmations = 6;
        assert!(deposit.meets_threshold());
        deposit.confirmations = 9;
        assert!(deposit.meets_threshold());
    }
}

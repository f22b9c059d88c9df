//! Withdrawal entity: one outbound transfer request
//!
//! State machine: `PENDING -> PROCESSING -> {CONFIRMED | FAILED}`; PENDING
//! may also fail directly. Every transition checks the current stored status
//! first, so a transition is never double-applied.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::wallet::{WalletError, WalletId};
use crate::domain::value_objects::{Currency, Timestamp};

/// Unique identifier for a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WithdrawalId(Uuid);

impl WithdrawalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WithdrawalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    /// Funds locked, awaiting settlement
    #[default]
    Pending,
    /// Handed to the external settlement path
    Processing,
    /// Funds irrevocably sent; terminal
    Confirmed,
    /// Funds returned to the wallet; terminal
    Failed,
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WithdrawalStatus::Pending => write!(f, "PENDING"),
            WithdrawalStatus::Processing => write!(f, "PROCESSING"),
            WithdrawalStatus::Confirmed => write!(f, "CONFIRMED"),
            WithdrawalStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalError {
    #[error("withdrawal {0} not found")]
    NotFound(WithdrawalId),
    #[error("wallet {0} not found")]
    WalletNotFound(WalletId),
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("net amount after fee is not positive: amount {amount}, fee {fee}")]
    DustAmount { amount: Decimal, fee: Decimal },
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },
    #[error("settlement failed: {0}")]
    Settlement(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// One outbound transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub wallet_id: WalletId,
    pub currency: Currency,
    /// Requested amount; this is what gets locked on the wallet
    pub amount: Decimal,
    /// Flat withdrawal fee, taken out of `amount`
    pub fee: Decimal,
    /// `amount - fee`, the amount actually sent out
    pub net_amount: Decimal,
    pub to_address: String,
    /// Optional destination tag
    pub memo: Option<String>,
    pub status: WithdrawalStatus,
    /// Settlement reference, assigned when processing begins
    pub tx_hash: Option<String>,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl Withdrawal {
    pub fn new(
        wallet_id: WalletId,
        currency: Currency,
        amount: Decimal,
        fee: Decimal,
        to_address: impl Into<String>,
    ) -> Self {
        Self {
            id: WithdrawalId::new(),
            wallet_id,
            currency,
            amount,
            fee,
            net_amount: amount - fee,
            to_address: to_address.into(),
            memo: None,
            status: WithdrawalStatus::Pending,
            tx_hash: None,
            created_at: chrono::Utc::now(),
            processed_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            WithdrawalStatus::Confirmed | WithdrawalStatus::Failed
        )
    }

    /// PENDING -> PROCESSING, assigning the settlement reference.
    pub fn start_processing(
        &mut self,
        tx_hash: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), WithdrawalError> {
        if self.status != WithdrawalStatus::Pending {
            return Err(WithdrawalError::InvalidTransition {
                from: self.status,
                to: WithdrawalStatus::Processing,
            });
        }
        self.tx_hash = Some(tx_hash.into());
        self.status = WithdrawalStatus::Processing;
        self.processed_at = Some(now);
        Ok(())
    }

    /// PROCESSING -> CONFIRMED.
    pub fn confirm(&mut self, now: Timestamp) -> Result<(), WithdrawalError> {
        if self.status != WithdrawalStatus::Processing {
            return Err(WithdrawalError::InvalidTransition {
                from: self.status,
                to: WithdrawalStatus::Confirmed,
            });
        }
        self.status = WithdrawalStatus::Confirmed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// {PENDING, PROCESSING} -> FAILED.
    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), WithdrawalError> {
        if self.is_terminal() {
            return Err(WithdrawalError::InvalidTransition {
                from: self.status,
                to: WithdrawalStatus::Failed,
            });
        }
        self.status = WithdrawalStatus::Failed;
        self.error_message = Some(reason.into());
        self.completed_at = Some(now);
        Ok(())
    }
}

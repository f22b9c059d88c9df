pub mod entities;
pub mod value_objects;

// Re-export entity types
pub use entities::{
    Deposit, DepositError, DepositId, DepositStatus, VerificationTier, Wallet, WalletError,
    WalletId, Withdrawal, WithdrawalError, WithdrawalId, WithdrawalStatus,
};

// Re-export value objects
pub use value_objects::{
    Currency, DepositMemo, MemoError, MemoIdentity, NetworkRoute, Timestamp, fallback_routes,
};

mod deposit;
mod wallet;
mod withdrawal;

pub use deposit::{Deposit, DepositError, DepositId, DepositStatus, VerificationTier};
pub use wallet::{Wallet, WalletError, WalletId};
pub use withdrawal::{Withdrawal, WithdrawalError, WithdrawalId, WithdrawalStatus};

mod in_memory_deposit;
mod in_memory_wallet;
mod in_memory_withdrawal;

pub use in_memory_deposit::InMemoryDepositRepository;
pub use in_memory_wallet::InMemoryWalletRepository;
pub use in_memory_withdrawal::InMemoryWithdrawalRepository;

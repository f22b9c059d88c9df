mod deposit_ledger;
mod deposit_verifier;
mod deposit_watcher;
mod wallet_registry;
mod withdrawal_ledger;

pub use deposit_ledger::DepositLedger;
pub use deposit_verifier::DepositVerifier;
pub use deposit_watcher::{DepositWatcher, WatchKey, WatcherConfig};
pub use wallet_registry::{ProvisionError, WalletRegistry};
pub use withdrawal_ledger::{SettlementTiming, WithdrawalLedger};

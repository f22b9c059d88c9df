pub mod ports;
pub mod use_cases;

pub use ports::{
    DepositInsert, DepositRepository, ExchangeGateway, GatewayDeposit, GatewayError,
    GatewayTxStatus, ListenKey, StreamEvent, WalletRepository, WithdrawalRepository,
};

pub use use_cases::{
    DepositLedger, DepositVerifier, DepositWatcher, ProvisionError, SettlementTiming,
    WalletRegistry, WatchKey, WatcherConfig, WithdrawalLedger,
};

pub mod config;
pub mod gateway;
pub mod repositories;

pub use config::{ConfigError, LedgerConfig};
pub use gateway::SimulatedExchangeGateway;
pub use repositories::{
    InMemoryDepositRepository, InMemoryWalletRepository, InMemoryWithdrawalRepository,
};

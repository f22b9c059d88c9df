mod deposit_repository;
mod exchange_gateway;
mod wallet_repository;
mod withdrawal_repository;

pub use deposit_repository::{DepositInsert, DepositRepository};
pub use exchange_gateway::{
    ExchangeGateway, GatewayDeposit, GatewayError, GatewayTxStatus, ListenKey, StreamEvent,
};
pub use wallet_repository::WalletRepository;
pub use withdrawal_repository::WithdrawalRepository;

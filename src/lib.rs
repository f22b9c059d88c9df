//! Custody Ledger
//!
//! A per-user custodial balance ledger for externally settled currency
//! movements. Deposits arrive from an external exchange account and are
//! verified, recorded and credited exactly once; withdrawals lock funds,
//! settle asynchronously and either consume or restore the lock.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture with clear separation of concerns:
//!
//! - **Domain**: Core entities and rules (Wallet, Deposit, Withdrawal, memo
//!   wire format, chain metadata)
//! - **Application**: Use cases and port interfaces (WalletRegistry,
//!   DepositLedger, WithdrawalLedger, DepositWatcher)
//! - **Infrastructure**: Implementations of ports (in-memory repositories,
//!   simulated exchange gateway, JSON configuration)
//!
//! # Features
//!
//! - Idempotent deposit crediting keyed on (tx hash, currency)
//! - Memo-based deposit verification with address fallback
//! - Balance locking for in-flight withdrawals with guarded state machine
//! - Dual-channel deposit detection: push stream with polling fallback
//!
//! # Example
//!
//! ```ignore
//! use custody_ledger::{LedgerConfig, SimulatedExchangeGateway, WalletRegistry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LedgerConfig::default();
//!     let gateway = std::sync::Arc::new(SimulatedExchangeGateway::new());
//!     // wire repositories and use cases, then provision wallets
//! }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export entity and value-object types
pub use domain::{
    Currency, Deposit, DepositError, DepositId, DepositMemo, DepositStatus, MemoError,
    MemoIdentity, NetworkRoute, Timestamp, VerificationTier, Wallet, WalletError, WalletId,
    Withdrawal, WithdrawalError, WithdrawalId, WithdrawalStatus, fallback_routes,
};

// Re-export ports
pub use application::ports::{
    DepositInsert, DepositRepository, ExchangeGateway, GatewayDeposit, GatewayError,
    GatewayTxStatus, ListenKey, StreamEvent, WalletRepository, WithdrawalRepository,
};

// Re-export use cases
pub use application::{
    DepositLedger, DepositVerifier, DepositWatcher, ProvisionError, SettlementTiming, WalletRegistry,
    WatchKey, WatcherConfig, WithdrawalLedger,
};

// Re-export infrastructure
pub use infrastructure::{
    ConfigError, InMemoryDepositRepository, InMemoryWalletRepository,
    InMemoryWithdrawalRepository, LedgerConfig, SimulatedExchangeGateway,
};

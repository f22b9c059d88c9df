//! Port for the external exchange
//!
//! The exchange issues deposit addresses, reports deposit history, and
//! optionally offers a push event subscription (listen key + streaming
//! channel). The ledger is written against this trait; any one exchange's
//! wire format lives behind an implementation of it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::domain::{Currency, NetworkRoute};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The exchange has no deposit addresses for this asset. Callers degrade
    /// to a placeholder wallet instead of failing hard.
    #[error("no deposit address support for currency {0}")]
    UnsupportedCurrency(String),
    /// Clock/session skew between us and the exchange. Retryable after a
    /// short delay; surfaced distinctly from unsupported-currency.
    #[error("gateway clock out of sync; retry after resynchronization")]
    ClockSkew,
    /// The exchange does not grant a push subscription. The common default;
    /// ingestion falls back to polling.
    #[error("push stream not available")]
    StreamUnsupported,
    #[error("gateway transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::ClockSkew | GatewayError::Transport(_))
    }
}

/// Key identifying one push-stream session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenKey(pub String);

impl std::fmt::Display for ListenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deposit status as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayTxStatus {
    Pending,
    Confirmed,
}

/// One deposit as the exchange reports it, from either channel (push stream
/// or history polling)
#[derive(Debug, Clone)]
pub struct GatewayDeposit {
    pub tx_id: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub from_address: Option<String>,
    pub to_address: String,
    pub memo: Option<String>,
    pub confirmations: u32,
    pub status: GatewayTxStatus,
}

/// Message on the push channel
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Deposit(GatewayDeposit),
    /// The exchange is closing this stream
    Closed,
}

#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Establish clock/session synchronization with the exchange. Must be
    /// called (or lazily triggered) before any other method.
    async fn initialize(&self) -> Result<(), GatewayError>;

    /// Issue (or return the existing) deposit address for a currency
    async fn deposit_address(&self, currency: &Currency) -> Result<String, GatewayError>;

    /// Request a push-stream session key. `StreamUnsupported` is the common
    /// default and triggers the polling fallback.
    async fn create_listen_key(&self) -> Result<ListenKey, GatewayError>;

    /// Open the streaming channel for a listen key
    async fn connect_stream(
        &self,
        key: &ListenKey,
    ) -> Result<broadcast::Receiver<StreamEvent>, GatewayError>;

    /// Tear down a push-stream session
    async fn disconnect_stream(&self, key: &ListenKey);

    /// Recent deposit history for a currency; the polling source of truth
    async fn deposit_history(
        &self,
        currency: &Currency,
        limit: usize,
    ) -> Result<Vec<GatewayDeposit>, GatewayError>;

    /// Networks a currency can be deposited over. On error or empty result
    /// the caller substitutes a static fallback table.
    async fn currency_networks(&self, currency: &Currency)
    -> Result<Vec<NetworkRoute>, GatewayError>;

    /// Submit an outbound transfer; returns the settlement reference
    async fn submit_withdrawal(
        &self,
        currency: &Currency,
        to_address: &str,
        amount: Decimal,
        memo: Option<&str>,
    ) -> Result<String, GatewayError>;
}

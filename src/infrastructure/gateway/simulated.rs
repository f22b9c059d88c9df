//! Simulated exchange gateway
//!
//! A deterministic stand-in for a real exchange: issues one deposit address
//! per currency, keeps an injectable deposit history, and exposes an
//! optional push stream per listen key. Toggles let tests and the demo
//! binary exercise clock skew, missing push support and settlement
//! failures.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::application::ports::{
    ExchangeGateway, GatewayDeposit, GatewayError, ListenKey, StreamEvent,
};
use crate::domain::{Currency, NetworkRoute, fallback_routes};

const STREAM_CAPACITY: usize = 256;

#[derive(Default)]
struct GatewayState {
    initialized: bool,
    clock_skewed: bool,
    push_enabled: bool,
    connect_failing: bool,
    withdrawals_failing: bool,
    /// Routes per supported currency code
    supported: HashMap<String, Vec<NetworkRoute>>,
    /// One deposit address per currency, stable across calls
    addresses: HashMap<String, String>,
    history: Vec<GatewayDeposit>,
    address_seq: u64,
    withdrawal_seq: u64,
}

pub struct SimulatedExchangeGateway {
    state: Arc<RwLock<GatewayState>>,
    streams: Arc<DashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl SimulatedExchangeGateway {
    pub fn new() -> Self {
        let mut supported = HashMap::new();
        for code in ["BTC", "ETH", "USDT", "SOL", "LTC"] {
            supported.insert(code.to_string(), fallback_routes(&Currency::new(code)));
        }
        Self {
            state: Arc::new(RwLock::new(GatewayState {
                supported,
                ..GatewayState::default()
            })),
            streams: Arc::new(DashMap::new()),
        }
    }

    pub fn set_clock_skew(&self, skewed: bool) {
        self.state.write().clock_skewed = skewed;
    }

    pub fn set_push_enabled(&self, enabled: bool) {
        self.state.write().push_enabled = enabled;
    }

    /// Make `connect_stream` refuse while still issuing listen keys
    pub fn set_connect_failing(&self, failing: bool) {
        self.state.write().connect_failing = failing;
    }

    pub fn set_withdrawals_failing(&self, failing: bool) {
        self.state.write().withdrawals_failing = failing;
    }

    /// Record a deposit in history and publish it on every open stream
    pub fn inject_deposit(&self, deposit: GatewayDeposit) {
        self.state.write().history.push(deposit.clone());
        for stream in self.streams.iter() {
            let _ = stream.value().send(StreamEvent::Deposit(deposit.clone()));
        }
    }

    /// Record a deposit only in history; streams see nothing
    pub fn inject_history_only(&self, deposit: GatewayDeposit) {
        self.state.write().history.push(deposit);
    }

    /// Abnormally close every open stream
    pub fn close_streams(&self) {
        for stream in self.streams.iter() {
            let _ = stream.value().send(StreamEvent::Closed);
        }
        self.streams.clear();
    }

    /// Number of push sessions not yet torn down
    pub fn open_stream_count(&self) -> usize {
        self.streams.len()
    }

    fn check_clock(&self) -> Result<(), GatewayError> {
        let mut state = self.state.write();
        if state.clock_skewed {
            return Err(GatewayError::ClockSkew);
        }
        // Lazily establish the session on first use
        state.initialized = true;
        Ok(())
    }
}

impl Default for SimulatedExchangeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeGateway for SimulatedExchangeGateway {
    async fn initialize(&self) -> Result<(), GatewayError> {
        self.check_clock()
    }

    async fn deposit_address(&self, currency: &Currency) -> Result<String, GatewayError> {
        self.check_clock()?;
        let mut state = self.state.write();
        if !state.supported.contains_key(currency.as_str()) {
            return Err(GatewayError::UnsupportedCurrency(
                currency.as_str().to_string(),
            ));
        }
        if let Some(address) = state.addresses.get(currency.as_str()) {
            return Ok(address.clone());
        }
        state.address_seq += 1;
        let address = format!(
            "sim-{}-{:06}",
            currency.as_str().to_lowercase(),
            state.address_seq
        );
        state
            .addresses
            .insert(currency.as_str().to_string(), address.clone());
        Ok(address)
    }

    async fn create_listen_key(&self) -> Result<ListenKey, GatewayError> {
        self.check_clock()?;
        if !self.state.read().push_enabled {
            return Err(GatewayError::StreamUnsupported);
        }
        let key = Uuid::new_v4().simple().to_string();
        let (tx, _) = broadcast::channel(STREAM_CAPACITY);
        self.streams.insert(key.clone(), tx);
        debug!(key = %key, "listen key issued");
        Ok(ListenKey(key))
    }

    async fn connect_stream(
        &self,
        key: &ListenKey,
    ) -> Result<broadcast::Receiver<StreamEvent>, GatewayError> {
        if self.state.read().connect_failing {
            return Err(GatewayError::Transport(
                "stream connect refused".to_string(),
            ));
        }
        self.streams
            .get(&key.0)
            .map(|tx| tx.value().subscribe())
            .ok_or_else(|| GatewayError::Transport(format!("unknown listen key {key}")))
    }

    async fn disconnect_stream(&self, key: &ListenKey) {
        self.streams.remove(&key.0);
    }

    async fn deposit_history(
        &self,
        currency: &Currency,
        limit: usize,
    ) -> Result<Vec<GatewayDeposit>, GatewayError> {
        self.check_clock()?;
        let state = self.state.read();
        let mut entries: Vec<GatewayDeposit> = state
            .history
            .iter()
            .filter(|d| d.currency == *currency)
            .cloned()
            .collect();
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    async fn currency_networks(
        &self,
        currency: &Currency,
    ) -> Result<Vec<NetworkRoute>, GatewayError> {
        self.check_clock()?;
        Ok(self
            .state
            .read()
            .supported
            .get(currency.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_withdrawal(
        &self,
        currency: &Currency,
        to_address: &str,
        amount: Decimal,
        _memo: Option<&str>,
    ) -> Result<String, GatewayError> {
        self.check_clock()?;
        let mut state = self.state.write();
        if state.withdrawals_failing {
            return Err(GatewayError::Transport(
                "withdrawal endpoint unavailable".to_string(),
            ));
        }
        state.withdrawal_seq += 1;
        debug!(currency = %currency, to = to_address, amount = %amount, "withdrawal submitted");
        Ok(format!("sim-wd-{:08x}", state.withdrawal_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_address_is_stable_per_currency() {
        let gateway = SimulatedExchangeGateway::new();
        let currency = Currency::new("USDT");

        let a = gateway.deposit_address(&currency).await.unwrap();
        let b = gateway.deposit_address(&currency).await.unwrap();
        assert_eq!(a, b);

        let other = gateway.deposit_address(&Currency::new("BTC")).await.unwrap();
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn test_unsupported_currency() {
        let gateway = SimulatedExchangeGateway::new();
        assert_eq!(
            gateway.deposit_address(&Currency::new("NOPE")).await,
            Err(GatewayError::UnsupportedCurrency("NOPE".to_string()))
        );
    }

    #[tokio::test]
    async fn test_clock_skew_blocks_until_cleared() {
        let gateway = SimulatedExchangeGateway::new();
        gateway.set_clock_skew(true);
        assert_eq!(gateway.initialize().await, Err(GatewayError::ClockSkew));

        gateway.set_clock_skew(false);
        assert!(gateway.initialize().await.is_ok());
    }

    #[tokio::test]
    async fn test_push_disabled_by_default() {
        let gateway = SimulatedExchangeGateway::new();
        assert_eq!(
            gateway.create_listen_key().await,
            Err(GatewayError::StreamUnsupported)
        );
    }

    #[tokio::test]
    async fn test_stream_delivers_injected_deposits() {
        let gateway = SimulatedExchangeGateway::new();
        gateway.set_push_enabled(true);

        let key = gateway.create_listen_key().await.unwrap();
        let mut rx = gateway.connect_stream(&key).await.unwrap();

        gateway.inject_deposit(GatewayDeposit {
            tx_id: "0xaaa".to_string(),
            currency: Currency::new("USDT"),
            amount: dec!(10),
            from_address: None,
            to_address: "addr".to_string(),
            memo: None,
            confirmations: 6,
            status: crate::application::ports::GatewayTxStatus::Confirmed,
        });

        match rx.recv().await.unwrap() {
            StreamEvent::Deposit(d) => assert_eq!(d.tx_id, "0xaaa"),
            StreamEvent::Closed => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn test_history_is_currency_filtered_and_limited() {
        let gateway = SimulatedExchangeGateway::new();
        for i in 0..5 {
            gateway.inject_history_only(GatewayDeposit {
                tx_id: format!("0x{i}"),
                currency: Currency::new("USDT"),
                amount: dec!(1),
                from_address: None,
                to_address: "addr".to_string(),
                memo: None,
                confirmations: 6,
                status: crate::application::ports::GatewayTxStatus::Confirmed,
            });
        }

        let history = gateway
            .deposit_history(&Currency::new("USDT"), 3)
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].tx_id, "0x2");

        assert!(
            gateway
                .deposit_history(&Currency::new("BTC"), 10)
                .await
                .unwrap()
                .is_empty()
        );
    }
}

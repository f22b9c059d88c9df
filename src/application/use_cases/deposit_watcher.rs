//! Deposit watcher: per-(tenant, user) ingestion lifecycle
//!
//! Runs a push listener when the exchange grants one and a polling fallback
//! otherwise, both funneling into the deposit ledger. The registry of active
//! watchers is owned by this service; `start` and `stop` are its only
//! mutators.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::{
    DepositRepository, ExchangeGateway, GatewayError, ListenKey, StreamEvent, WalletRepository,
};

use super::deposit_ledger::DepositLedger;

/// Identity of one watcher
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchKey {
    pub tenant_id: String,
    pub user_id: String,
}

impl std::fmt::Display for WatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Polling cadence for the fallback channel
    pub polling_interval: Duration,
    /// History page size per poll
    pub poll_history_limit: usize,
    /// A push stream that dies earlier than this is treated as never having
    /// worked: straight to polling, no reconnect attempt. A stream that
    /// outlives it earns one reconnect attempt per death.
    pub push_grace: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(60),
            poll_history_limit: 50,
            push_grace: Duration::from_secs(30),
        }
    }
}

struct WatchHandle {
    task: JoinHandle<()>,
    /// Current push session, shared with the watch task so reconnects stay
    /// visible to `stop`
    listen_key: Arc<Mutex<Option<ListenKey>>>,
}

/// Lifecycle-managed registry of per-user ingestion tasks
pub struct DepositWatcher<W, D, G>
where
    W: WalletRepository,
    D: DepositRepository,
    G: ExchangeGateway,
{
    ledger: Arc<DepositLedger<W, D>>,
    wallets: Arc<W>,
    gateway: Arc<G>,
    config: WatcherConfig,
    watchers: DashMap<WatchKey, WatchHandle>,
}

impl<W, D, G> DepositWatcher<W, D, G>
where
    W: WalletRepository + 'static,
    D: DepositRepository + 'static,
    G: ExchangeGateway + 'static,
{
    pub fn new(
        ledger: Arc<DepositLedger<W, D>>,
        wallets: Arc<W>,
        gateway: Arc<G>,
        config: WatcherConfig,
    ) -> Self {
        Self {
            ledger,
            wallets,
            gateway,
            config,
            watchers: DashMap::new(),
        }
    }

    /// Start watching deposits for one (tenant, user). Prefers the push
    /// channel; any push setup failure degrades to polling without
    /// surfacing an error.
    pub async fn start(&self, tenant_id: &str, user_id: &str) {
        let key = WatchKey {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
        };
        if self.watchers.contains_key(&key) {
            debug!(watcher = %key, "already watching");
            return;
        }

        let listen_key = Arc::new(Mutex::new(None));
        let stream = match self.gateway.create_listen_key().await {
            Ok(lk) => match self.gateway.connect_stream(&lk).await {
                Ok(rx) => {
                    *listen_key.lock() = Some(lk);
                    Some(rx)
                }
                Err(e) => {
                    warn!(watcher = %key, error = %e, "stream connect failed; using polling");
                    // Release the session the exchange just granted
                    self.gateway.disconnect_stream(&lk).await;
                    None
                }
            },
            Err(e) => {
                debug!(watcher = %key, error = %e, "push unavailable; using polling");
                None
            }
        };

        let task = tokio::spawn(run_watch(
            Arc::clone(&self.ledger),
            Arc::clone(&self.wallets),
            Arc::clone(&self.gateway),
            self.config.clone(),
            key.clone(),
            stream,
            Arc::clone(&listen_key),
        ));

        info!(watcher = %key, push = listen_key.lock().is_some(), "watcher started");
        self.watchers.insert(key, WatchHandle { task, listen_key });
    }

    /// Stop watching: unsubscribe the push channel, cancel polling, drop
    /// the registry entry. In-flight ledger writes are never cancelled.
    pub async fn stop(&self, tenant_id: &str, user_id: &str) {
        let key = WatchKey {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
        };
        if let Some((_, handle)) = self.watchers.remove(&key) {
            let current = handle.listen_key.lock().take();
            if let Some(lk) = current {
                self.gateway.disconnect_stream(&lk).await;
            }
            handle.task.abort();
            info!(watcher = %key, "watcher stopped");
        }
    }

    /// Keys of currently active watchers
    pub fn active(&self) -> Vec<WatchKey> {
        self.watchers.iter().map(|e| e.key().clone()).collect()
    }

    /// Stop every watcher
    pub async fn shutdown(&self) {
        let keys = self.active();
        for key in keys {
            self.stop(&key.tenant_id, &key.user_id).await;
        }
    }
}

/// Body of one watcher task: drain the push stream while it lives, then
/// poll. A stream that outlives the grace window earns a reconnect attempt
/// when it dies; one that dies inside it never really worked, so polling
/// takes over for good. Both paths submit through the idempotent ledger, so
/// overlapping delivery is harmless.
async fn run_watch<W, D, G>(
    ledger: Arc<DepositLedger<W, D>>,
    wallets: Arc<W>,
    gateway: Arc<G>,
    config: WatcherConfig,
    key: WatchKey,
    mut stream: Option<broadcast::Receiver<StreamEvent>>,
    listen_key: Arc<Mutex<Option<ListenKey>>>,
) where
    W: WalletRepository,
    D: DepositRepository,
    G: ExchangeGateway,
{
    while let Some(rx) = stream.take() {
        let started = tokio::time::Instant::now();
        drain_stream(&ledger, &key, rx).await;

        let dead = listen_key.lock().take();
        if let Some(lk) = dead {
            gateway.disconnect_stream(&lk).await;
        }

        if started.elapsed() < config.push_grace {
            warn!(watcher = %key, "push stream died within grace window; polling from here on");
            break;
        }
        match reconnect_stream(&gateway).await {
            Ok((lk, rx)) => {
                info!(watcher = %key, "push stream reconnected");
                *listen_key.lock() = Some(lk);
                stream = Some(rx);
            }
            Err(e) => {
                warn!(watcher = %key, error = %e, "push reconnect failed; polling from here on");
                break;
            }
        }
    }

    let mut ticker = tokio::time::interval(config.polling_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        poll_once(&ledger, &wallets, &gateway, &config, &key).await;
    }
}

async fn reconnect_stream<G>(
    gateway: &Arc<G>,
) -> Result<(ListenKey, broadcast::Receiver<StreamEvent>), GatewayError>
where
    G: ExchangeGateway,
{
    let lk = gateway.create_listen_key().await?;
    match gateway.connect_stream(&lk).await {
        Ok(rx) => Ok((lk, rx)),
        Err(e) => {
            gateway.disconnect_stream(&lk).await;
            Err(e)
        }
    }
}

async fn drain_stream<W, D>(
    ledger: &DepositLedger<W, D>,
    key: &WatchKey,
    mut rx: broadcast::Receiver<StreamEvent>,
) where
    W: WalletRepository,
    D: DepositRepository,
{
    loop {
        match rx.recv().await {
            Ok(StreamEvent::Deposit(event)) => {
                if let Err(e) = ledger.process_deposit(&event).await {
                    warn!(watcher = %key, tx = %event.tx_id, error = %e, "streamed deposit rejected");
                }
            }
            Ok(StreamEvent::Closed) => return,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Polling will pick up anything we missed
                warn!(watcher = %key, skipped, "push stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn poll_once<W, D, G>(
    ledger: &DepositLedger<W, D>,
    wallets: &Arc<W>,
    gateway: &Arc<G>,
    config: &WatcherConfig,
    key: &WatchKey,
) where
    W: WalletRepository,
    D: DepositRepository,
    G: ExchangeGateway,
{
    let user_wallets = wallets.list_for_user(&key.tenant_id, &key.user_id).await;
    for wallet in user_wallets
        .iter()
        .filter(|w| w.is_active && !w.is_test_wallet)
    {
        let history = match gateway
            .deposit_history(&wallet.currency, config.poll_history_limit)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(watcher = %key, currency = %wallet.currency, error = %e, "history poll failed");
                continue;
            }
        };

        for entry in history.into_iter().filter(|e| e.to_address == wallet.address) {
            if let Some(existing) = ledger.find_recorded(&entry.tx_id, &entry.currency).await {
                if existing.is_confirmed() {
                    continue;
                }
            }
            if let Err(e) = ledger.process_deposit(&entry).await {
                warn!(watcher = %key, tx = %entry.tx_id, error = %e, "polled deposit rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use crate::infrastructure::{
        InMemoryDepositRepository, InMemoryWalletRepository, SimulatedExchangeGateway,
    };
    use crate::{WalletRegistry, GatewayDeposit, GatewayTxStatus};
    use rust_decimal_macros::dec;

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            polling_interval: Duration::from_millis(20),
            poll_history_limit: 50,
            push_grace: Duration::from_millis(100),
        }
    }

    async fn setup(
        gateway: Arc<SimulatedExchangeGateway>,
    ) -> (
        Arc<
            DepositWatcher<
                InMemoryWalletRepository,
                InMemoryDepositRepository,
                SimulatedExchangeGateway,
            >,
        >,
        Arc<InMemoryWalletRepository>,
        crate::Wallet,
    ) {
        let wallets = Arc::new(InMemoryWalletRepository::new());
        let deposits = Arc::new(InMemoryDepositRepository::new());
        let registry = WalletRegistry::new(Arc::clone(&wallets), Arc::clone(&gateway), "CLDG");
        let wallet = registry
            .get_or_create("guild42", "1001", &Currency::new("USDT"), None)
            .await
            .unwrap();

        let ledger = Arc::new(DepositLedger::new(
            Arc::clone(&wallets),
            deposits,
            "CLDG",
            6,
        ));
        let watcher = Arc::new(DepositWatcher::new(
            ledger,
            Arc::clone(&wallets),
            gateway,
            fast_config(),
        ));
        (watcher, wallets, wallet)
    }

    fn confirmed_event(wallet: &crate::Wallet, tx: &str) -> GatewayDeposit {
        GatewayDeposit {
            tx_id: tx.to_string(),
            currency: wallet.currency.clone(),
            amount: dec!(10),
            from_address: None,
            to_address: wallet.address.clone(),
            memo: wallet.deposit_memo.clone(),
            confirmations: 6,
            status: GatewayTxStatus::Confirmed,
        }
    }

    #[tokio::test]
    async fn test_polling_detects_injected_deposit() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        let (watcher, wallets, wallet) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;
        gateway.inject_deposit(confirmed_event(&wallet, "0xpoll"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(wallets.get(wallet.id).await.unwrap().balance, dec!(10));

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_cleans_up() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        let (watcher, wallets, wallet) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;
        watcher.start("guild42", "1001").await;
        assert_eq!(watcher.active().len(), 1);

        watcher.stop("guild42", "1001").await;
        assert!(watcher.active().is_empty());

        // Deposits injected after stop are not picked up
        gateway.inject_deposit(confirmed_event(&wallet, "0xlate"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wallets.get(wallet.id).await.unwrap().balance, dec!(0));
    }

    #[tokio::test]
    async fn test_push_channel_delivers() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        gateway.set_push_enabled(true);
        let (watcher, wallets, wallet) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.inject_deposit(confirmed_event(&wallet, "0xpush"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wallets.get(wallet.id).await.unwrap().balance, dec!(10));

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_connect_releases_the_listen_key() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        gateway.set_push_enabled(true);
        gateway.set_connect_failing(true);
        let (watcher, _, _) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;

        // The granted session was torn down and the watcher still runs
        assert_eq!(gateway.open_stream_count(), 0);
        assert_eq!(watcher.active().len(), 1);

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_long_lived_stream_earns_a_reconnect() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        gateway.set_push_enabled(true);
        let (watcher, wallets, wallet) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;
        // Outlive the 100ms grace window before the stream dies
        tokio::time::sleep(Duration::from_millis(150)).await;
        gateway.close_streams();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(gateway.open_stream_count(), 1);

        // The reconnected stream still delivers
        gateway.inject_deposit(confirmed_event(&wallet, "0xreconnect"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(wallets.get(wallet.id).await.unwrap().balance, dec!(10));

        watcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_stream_close_falls_back_to_polling() {
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        gateway.set_push_enabled(true);
        let (watcher, wallets, wallet) = setup(Arc::clone(&gateway)).await;

        watcher.start("guild42", "1001").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.close_streams();

        // Delivered through history only; the push channel is gone
        gateway.inject_history_only(confirmed_event(&wallet, "0xfallback"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(wallets.get(wallet.id).await.unwrap().balance, dec!(10));

        watcher.shutdown().await;
    }
}

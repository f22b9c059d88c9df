//! Integration tests for dual-channel deposit ingestion
//!
//! A watcher per (tenant, user) prefers the exchange push stream and falls
//! back to history polling. Both channels submit through the idempotent
//! deposit ledger, so overlapping delivery credits once.

use custody_ledger::{
    Currency, DepositLedger, DepositWatcher, GatewayDeposit, GatewayTxStatus,
    InMemoryDepositRepository, InMemoryWalletRepository, SimulatedExchangeGateway, Wallet,
    WalletRegistry, WalletRepository, WatcherConfig,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

struct IngestionContext {
    wallets: Arc<InMemoryWalletRepository>,
    gateway: Arc<SimulatedExchangeGateway>,
    ledger: Arc<DepositLedger<InMemoryWalletRepository, InMemoryDepositRepository>>,
    watcher: DepositWatcher<
        InMemoryWalletRepository,
        InMemoryDepositRepository,
        SimulatedExchangeGateway,
    >,
}

fn fast_config() -> WatcherConfig {
    WatcherConfig {
        polling_interval: Duration::from_millis(20),
        poll_history_limit: 50,
        push_grace: Duration::from_millis(100),
    }
}

async fn create_context(push_enabled: bool) -> (IngestionContext, Wallet) {
    let wallets = Arc::new(InMemoryWalletRepository::new());
    let deposits = Arc::new(InMemoryDepositRepository::new());
    let gateway = Arc::new(SimulatedExchangeGateway::new());
    gateway.set_push_enabled(push_enabled);

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
    let watcher = DepositWatcher::new(
        Arc::clone(&ledger),
        Arc::clone(&wallets),
        Arc::clone(&gateway),
        fast_config(),
    );
    (
        IngestionContext {
            wallets,
            gateway,
            ledger,
            watcher,
        },
        wallet,
    )
}

fn confirmed_event(wallet: &Wallet, tx: &str) -> GatewayDeposit {
    GatewayDeposit {
        tx_id: tx.to_string(),
        currency: wallet.currency.clone(),
        amount: dec!(10),
        from_address: Some("0xsender".to_string()),
        to_address: wallet.address.clone(),
        memo: wallet.deposit_memo.clone(),
        confirmations: 6,
        status: GatewayTxStatus::Confirmed,
    }
}

#[tokio::test]
async fn push_and_manual_redelivery_credit_once() {
    let (ctx, wallet) = create_context(true).await;

    ctx.watcher.start("guild42", "1001").await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let event = confirmed_event(&wallet, "0xdual");
    ctx.gateway.inject_deposit(event.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The same event submitted again by hand, as a poller overlap would
    ctx.ledger.process_deposit(&event).await.unwrap();

    let wallet = ctx.wallets.get(wallet.id).await.unwrap();
    assert_eq!(wallet.balance, dec!(10));
    assert_eq!(wallet.total_deposited, dec!(10));

    ctx.watcher.shutdown().await;
}

#[tokio::test]
async fn polling_channel_detects_history_entries() {
    let (ctx, wallet) = create_context(false).await;

    ctx.watcher.start("guild42", "1001").await;
    ctx.gateway
        .inject_history_only(confirmed_event(&wallet, "0xpolled"));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(ctx.wallets.get(wallet.id).await.unwrap().balance, dec!(10));

    ctx.watcher.shutdown().await;
}

#[tokio::test]
async fn dead_push_stream_degrades_to_polling() {
    let (ctx, wallet) = create_context(true).await;

    ctx.watcher.start("guild42", "1001").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    ctx.gateway.close_streams();

    // Only history carries this one; the push channel is gone
    ctx.gateway
        .inject_history_only(confirmed_event(&wallet, "0xafterclose"));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(ctx.wallets.get(wallet.id).await.unwrap().balance, dec!(10));

    ctx.watcher.shutdown().await;
}

#[tokio::test]
async fn stopped_watcher_ignores_later_deposits() {
    let (ctx, wallet) = create_context(false).await;

    ctx.watcher.start("guild42", "1001").await;
    assert_eq!(ctx.watcher.active().len(), 1);

    ctx.watcher.stop("guild42", "1001").await;
    assert!(ctx.watcher.active().is_empty());

    ctx.gateway.inject_deposit(confirmed_event(&wallet, "0xlate"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.wallets.get(wallet.id).await.unwrap().balance, dec!(0));
}

#[tokio::test]
async fn test_wallets_are_never_polled() {
    let (ctx, _) = create_context(false).await;

    // NOPE is unsupported at the gateway, so this wallet is a placeholder
    let registry =
        WalletRegistry::new(Arc::clone(&ctx.wallets), Arc::clone(&ctx.gateway), "CLDG");
    let test_wallet = registry
        .get_or_create("guild42", "2002", &Currency::new("NOPE"), None)
        .await
        .unwrap();
    assert!(test_wallet.is_test_wallet);

    ctx.watcher.start("guild42", "2002").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        ctx.wallets.get(test_wallet.id).await.unwrap().balance,
        dec!(0)
    );
    ctx.watcher.shutdown().await;
}

use std::sync::Arc;
use std::time::Duration;

use custody_ledger::infrastructure::{
    InMemoryDepositRepository, InMemoryWalletRepository, InMemoryWithdrawalRepository,
    LedgerConfig, SimulatedExchangeGateway,
};
use custody_ledger::{
    Currency, DepositLedger, DepositWatcher, GatewayDeposit, GatewayTxStatus, WalletRegistry,
    WalletRepository, WithdrawalLedger,
};
use rust_decimal_macros::dec;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_help() {
    eprintln!(
        r#"Custody Ledger - per-user custodial balance ledger demo

USAGE:
    custody-ledger [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter

EXAMPLES:
    # Run the demo scenario with defaults
    custody-ledger

    # Run with config file
    custody-ledger --config config.json
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custody_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = if let Some(path) = config_path {
        tracing::info!("Loading configuration from: {}", path);
        LedgerConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        LedgerConfig::default()
    };
    tracing::info!("Memo prefix: {}", config.memo_prefix);
    tracing::info!("Required confirmations: {}", config.required_confirmations);
    tracing::info!("Withdrawal fee: {}", config.withdrawal_fee);

    // Wire the in-memory infrastructure to the use cases
    let wallets = Arc::new(InMemoryWalletRepository::new());
    let deposits = Arc::new(InMemoryDepositRepository::new());
    let withdrawals = Arc::new(InMemoryWithdrawalRepository::new());
    let gateway = Arc::new(SimulatedExchangeGateway::new());
    gateway.set_push_enabled(true);

    let registry = WalletRegistry::new(
        Arc::clone(&wallets),
        Arc::clone(&gateway),
        config.memo_prefix.clone(),
    );
    let deposit_ledger = Arc::new(DepositLedger::new(
        Arc::clone(&wallets),
        Arc::clone(&deposits),
        config.memo_prefix.clone(),
        config.required_confirmations,
    ));
    let withdrawal_ledger = WithdrawalLedger::new(
        Arc::clone(&wallets),
        Arc::clone(&withdrawals),
        Arc::clone(&gateway),
        config.withdrawal_fee,
        config.settlement_timing(),
    );
    let watcher = DepositWatcher::new(
        Arc::clone(&deposit_ledger),
        Arc::clone(&wallets),
        Arc::clone(&gateway),
        config.watcher_config(),
    );

    let recovered = withdrawal_ledger.recover_inflight().await;
    if recovered > 0 {
        tracing::info!("Recovered {} in-flight withdrawals", recovered);
    }

    // Demo scenario: provision a wallet, receive a deposit, withdraw part
    // of it through simulated settlement.
    let currency = Currency::new("USDT");
    let wallet = registry
        .get_or_create("guild42", "1001", &currency, None)
        .await?;
    tracing::info!("Wallet: address={} memo={:?}", wallet.address, wallet.deposit_memo);

    watcher.start("guild42", "1001").await;

    gateway.inject_deposit(GatewayDeposit {
        tx_id: "0xdemo-deposit".to_string(),
        currency: currency.clone(),
        amount: dec!(10),
        from_address: Some("0xsender".to_string()),
        to_address: wallet.address.clone(),
        memo: wallet.deposit_memo.clone(),
        confirmations: config.required_confirmations,
        status: GatewayTxStatus::Confirmed,
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let funded = wallets
        .get(wallet.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("wallet disappeared"))?;
    tracing::info!("Balance after deposit: {}", funded.balance);

    let withdrawal = withdrawal_ledger
        .request(wallet.id, dec!(4), "0xdemo-dest", None)
        .await?;
    tracing::info!(
        "Withdrawal {} requested: amount={} net={}",
        withdrawal.id,
        withdrawal.amount,
        withdrawal.net_amount
    );

    tokio::time::sleep(
        config.settlement_timing().processing_delay
            + config.settlement_timing().confirmation_delay
            + Duration::from_secs(1),
    )
    .await;

    let settled = wallets
        .get(wallet.id)
        .await
        .ok_or_else(|| anyhow::anyhow!("wallet disappeared"))?;
    tracing::info!(
        "Final balance sheet: balance={} locked={} deposited={} withdrawn={}",
        settled.balance,
        settled.locked_balance,
        settled.total_deposited,
        settled.total_withdrawn
    );

    watcher.shutdown().await;
    Ok(())
}

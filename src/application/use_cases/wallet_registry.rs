//! Wallet registry use case: get-or-create wallet identity per
//! (tenant, user, currency)

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{ExchangeGateway, GatewayError, WalletRepository};
use crate::domain::{Currency, DepositMemo, MemoError, NetworkRoute, Wallet, WalletError, WalletId, fallback_routes};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Memo(#[from] MemoError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

impl ProvisionError {
    /// Clock-skew style failures can be retried after a short delay;
    /// unsupported-currency never appears here (it degrades to a test
    /// wallet instead).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::Gateway(e) if e.is_retryable())
    }
}

/// Issues wallet identities: one (address, memo) pair per
/// (tenant, user, currency).
pub struct WalletRegistry<W, G>
where
    W: WalletRepository,
    G: ExchangeGateway,
{
    wallets: Arc<W>,
    gateway: Arc<G>,
    memo_prefix: String,
}

impl<W, G> WalletRegistry<W, G>
where
    W: WalletRepository,
    G: ExchangeGateway,
{
    pub fn new(wallets: Arc<W>, gateway: Arc<G>, memo_prefix: impl Into<String>) -> Self {
        Self {
            wallets,
            gateway,
            memo_prefix: memo_prefix.into(),
        }
    }

    /// Get the wallet for (tenant, user, currency), creating it on first
    /// call.
    ///
    /// Existing rows missing a verification memo (pre-verification-era
    /// records) get one generated and persisted. When the gateway reports
    /// the currency unsupported, a placeholder test wallet with a synthetic
    /// address is created instead of failing.
    pub async fn get_or_create(
        &self,
        tenant_id: &str,
        user_id: &str,
        currency: &Currency,
        chain: Option<&str>,
    ) -> Result<Wallet, ProvisionError> {
        if let Some(wallet) = self
            .wallets
            .find_by_owner(tenant_id, user_id, currency)
            .await
        {
            if wallet.deposit_memo.is_none() {
                let memo = DepositMemo::generate(&self.memo_prefix, user_id, tenant_id)?;
                let updated = self.wallets.set_memo(wallet.id, memo.as_str()).await?;
                info!(wallet = %wallet.id, "backfilled verification memo on legacy wallet");
                return Ok(updated);
            }
            return Ok(wallet);
        }

        let memo = DepositMemo::generate(&self.memo_prefix, user_id, tenant_id)?;

        let (address, is_test) = match self.gateway.deposit_address(currency).await {
            Ok(address) => (address, false),
            Err(GatewayError::UnsupportedCurrency(code)) => {
                warn!(
                    currency = %code,
                    "no deposit address support; creating placeholder test wallet"
                );
                (synthetic_address(currency), true)
            }
            Err(e) => return Err(e.into()),
        };

        let mut wallet = Wallet::new(tenant_id, user_id, currency.clone(), address, memo.as_str());
        if let Some(chain) = chain {
            wallet = wallet.with_chain(chain);
        }
        if is_test {
            wallet = wallet.as_test_wallet();
        }

        // Upsert keyed on the unique address absorbs a concurrent call that
        // provisioned the same gateway-issued address first.
        let stored = self.wallets.upsert_by_address(wallet).await;
        info!(
            wallet = %stored.id,
            tenant = tenant_id,
            user = user_id,
            currency = %currency,
            test_wallet = stored.is_test_wallet,
            "wallet provisioned"
        );
        Ok(stored)
    }

    /// Soft-deactivate a wallet. Rows are never physically deleted.
    pub async fn deactivate(&self, id: WalletId) -> Result<Wallet, ProvisionError> {
        Ok(self.wallets.set_active(id, false).await?)
    }

    /// Networks a currency can be deposited over, substituting the static
    /// fallback table when the gateway errs or reports nothing.
    pub async fn supported_networks(&self, currency: &Currency) -> Vec<NetworkRoute> {
        match self.gateway.currency_networks(currency).await {
            Ok(routes) if !routes.is_empty() => routes,
            Ok(_) => {
                warn!(currency = %currency, "gateway reported no networks; using fallback table");
                fallback_routes(currency)
            }
            Err(e) => {
                warn!(currency = %currency, error = %e, "network lookup failed; using fallback table");
                fallback_routes(currency)
            }
        }
    }
}

fn synthetic_address(currency: &Currency) -> String {
    format!(
        "test-{}-{:08x}",
        currency.as_str().to_lowercase(),
        rand::random::<u32>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{InMemoryWalletRepository, SimulatedExchangeGateway};

    fn setup() -> (
        WalletRegistry<InMemoryWalletRepository, SimulatedExchangeGateway>,
        Arc<InMemoryWalletRepository>,
        Arc<SimulatedExchangeGateway>,
    ) {
        let wallets = Arc::new(InMemoryWalletRepository::new());
        let gateway = Arc::new(SimulatedExchangeGateway::new());
        let registry = WalletRegistry::new(Arc::clone(&wallets), Arc::clone(&gateway), "CLDG");
        (registry, wallets, gateway)
    }

    #[tokio::test]
    async fn test_create_then_get_is_stable() {
        let (registry, _, _) = setup();
        let currency = Currency::new("USDT");

        let first = registry
            .get_or_create("guild42", "1001", &currency, None)
            .await
            .unwrap();
        let second = registry
            .get_or_create("guild42", "1001", &currency, None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.address, second.address);
        assert_eq!(first.deposit_memo, second.deposit_memo);
        assert!(!first.is_test_wallet);
        assert!(first.deposit_memo.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_currency_degrades_to_test_wallet() {
        let (registry, _, _) = setup();
        let currency = Currency::new("NOPE");

        let wallet = registry
            .get_or_create("guild42", "1001", &currency, None)
            .await
            .unwrap();

        assert!(wallet.is_test_wallet);
        assert!(wallet.address.starts_with("test-nope-"));
        assert!(wallet.deposit_memo.is_some());
    }

    #[tokio::test]
    async fn test_clock_skew_is_distinct_and_retryable() {
        let (registry, _, gateway) = setup();
        gateway.set_clock_skew(true);

        let err = registry
            .get_or_create("guild42", "1001", &Currency::new("USDT"), None)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err, ProvisionError::Gateway(GatewayError::ClockSkew));

        gateway.set_clock_skew(false);
        assert!(
            registry
                .get_or_create("guild42", "1001", &Currency::new("USDT"), None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_memo_backfill_on_legacy_row() {
        let (registry, wallets, _) = setup();
        let currency = Currency::new("USDT");

        let mut legacy = Wallet::new("guild42", "1001", currency.clone(), "legacy-addr", "x");
        legacy.deposit_memo = None;
        wallets.upsert_by_address(legacy.clone()).await;

        let wallet = registry
            .get_or_create("guild42", "1001", &currency, None)
            .await
            .unwrap();

        assert_eq!(wallet.id, legacy.id);
        let memo = wallet.deposit_memo.expect("memo backfilled");
        assert!(DepositMemo::parse("CLDG", &memo).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_provisioning_yields_one_wallet() {
        let (registry, wallets, _) = setup();
        let registry = Arc::new(registry);
        let currency = Currency::new("BTC");

        let a = {
            let registry = Arc::clone(&registry);
            let currency = currency.clone();
            tokio::spawn(
                async move { registry.get_or_create("g", "u", &currency, None).await },
            )
        };
        let b = {
            let registry = Arc::clone(&registry);
            let currency = currency.clone();
            tokio::spawn(
                async move { registry.get_or_create("g", "u", &currency, None).await },
            )
        };

        let wallet_a = a.await.unwrap().unwrap();
        let wallet_b = b.await.unwrap().unwrap();

        assert_eq!(wallet_a.address, wallet_b.address);
        assert_eq!(wallets.list_for_user("g", "u").await.len(), 1);
    }

    #[tokio::test]
    async fn test_supported_networks_fallback() {
        let (registry, _, _) = setup();

        // The simulated gateway knows USDT; the fallback covers it too, but
        // the gateway's answer wins.
        let routes = registry.supported_networks(&Currency::new("USDT")).await;
        assert!(!routes.is_empty());

        // Unknown to the gateway but present in the fallback table.
        let gateway_less = registry.supported_networks(&Currency::new("XRP")).await;
        assert!(gateway_less.iter().any(|r| r.requires_memo));
    }
}

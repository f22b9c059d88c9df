//! Withdrawal ledger use case: validate, lock, settle or roll back
//!
//! `request` returns as soon as the funds are locked; settlement progresses
//! on a spawned task (simulated external latency) and either consumes the
//! lock (`confirm`) or restores it exactly (`fail`).

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::application::ports::{ExchangeGateway, WalletRepository, WithdrawalRepository};
use crate::domain::{
    WalletId, Withdrawal, WithdrawalError, WithdrawalId, WithdrawalStatus,
};

/// Simulated settlement latency. In-memory timers do not survive a restart;
/// `recover_inflight` narrows that gap with a startup scan.
#[derive(Debug, Clone, Copy)]
pub struct SettlementTiming {
    pub processing_delay: Duration,
    pub confirmation_delay: Duration,
}

impl Default for SettlementTiming {
    fn default() -> Self {
        Self {
            processing_delay: Duration::from_secs(2),
            confirmation_delay: Duration::from_secs(5),
        }
    }
}

pub struct WithdrawalLedger<W, R, G>
where
    W: WalletRepository,
    R: WithdrawalRepository,
    G: ExchangeGateway,
{
    wallets: Arc<W>,
    withdrawals: Arc<R>,
    gateway: Arc<G>,
    fee: Decimal,
    timing: SettlementTiming,
}

impl<W, R, G> Clone for WithdrawalLedger<W, R, G>
where
    W: WalletRepository,
    R: WithdrawalRepository,
    G: ExchangeGateway,
{
    fn clone(&self) -> Self {
        Self {
            wallets: Arc::clone(&self.wallets),
            withdrawals: Arc::clone(&self.withdrawals),
            gateway: Arc::clone(&self.gateway),
            fee: self.fee,
            timing: self.timing,
        }
    }
}

impl<W, R, G> WithdrawalLedger<W, R, G>
where
    W: WalletRepository + 'static,
    R: WithdrawalRepository + 'static,
    G: ExchangeGateway + 'static,
{
    pub fn new(
        wallets: Arc<W>,
        withdrawals: Arc<R>,
        gateway: Arc<G>,
        fee: Decimal,
        timing: SettlementTiming,
    ) -> Self {
        Self {
            wallets,
            withdrawals,
            gateway,
            fee,
            timing,
        }
    }

    /// Request a withdrawal: validate, create the PENDING record, lock the
    /// funds, and hand off to asynchronous settlement. Returns before
    /// external settlement completes.
    pub async fn request(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        to_address: &str,
        memo: Option<&str>,
    ) -> Result<Withdrawal, WithdrawalError> {
        let wallet = self
            .wallets
            .get(wallet_id)
            .await
            .ok_or(WithdrawalError::WalletNotFound(wallet_id))?;

        if amount <= Decimal::ZERO {
            return Err(WithdrawalError::NonPositiveAmount(amount));
        }
        if amount > wallet.balance {
            return Err(WithdrawalError::InsufficientBalance {
                available: wallet.balance,
                requested: amount,
            });
        }
        let net_amount = amount - self.fee;
        if net_amount <= Decimal::ZERO {
            return Err(WithdrawalError::DustAmount {
                amount,
                fee: self.fee,
            });
        }

        let mut withdrawal =
            Withdrawal::new(wallet.id, wallet.currency.clone(), amount, self.fee, to_address);
        if let Some(memo) = memo {
            withdrawal = withdrawal.with_memo(memo);
        }
        self.withdrawals.save(withdrawal.clone()).await;

        // A concurrent request may have drained the balance between the
        // check above and this guarded lock; the record then fails without
        // any balance restore, since nothing was locked for it.
        if let Err(e) = self.wallets.lock_for_withdrawal(wallet.id, amount).await {
            let mut orphan = withdrawal.clone();
            let _ = orphan.fail(e.to_string(), chrono::Utc::now());
            self.withdrawals.save(orphan).await;
            return Err(e.into());
        }

        info!(
            withdrawal = %withdrawal.id,
            wallet = %wallet.id,
            amount = %amount,
            net = %net_amount,
            "withdrawal requested; funds locked"
        );

        self.spawn_settlement(withdrawal.id);
        Ok(withdrawal)
    }

    /// PENDING -> PROCESSING: submit to the exchange and record the
    /// settlement reference. A gateway failure routes to [`Self::fail`].
    pub async fn process(&self, id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        let mut withdrawal = self
            .withdrawals
            .get(id)
            .await
            .ok_or(WithdrawalError::NotFound(id))?;

        let tx_hash = self
            .gateway
            .submit_withdrawal(
                &withdrawal.currency,
                &withdrawal.to_address,
                withdrawal.net_amount,
                withdrawal.memo.as_deref(),
            )
            .await
            .map_err(|e| WithdrawalError::Settlement(e.to_string()))?;

        withdrawal.start_processing(tx_hash, chrono::Utc::now())?;
        self.withdrawals.save(withdrawal.clone()).await;
        info!(
            withdrawal = %withdrawal.id,
            tx = withdrawal.tx_hash.as_deref().unwrap_or(""),
            "withdrawal processing"
        );
        Ok(withdrawal)
    }

    /// PROCESSING -> CONFIRMED: consume the lock and count the outflow.
    pub async fn confirm(&self, id: WithdrawalId) -> Result<Withdrawal, WithdrawalError> {
        let mut withdrawal = self
            .withdrawals
            .get(id)
            .await
            .ok_or(WithdrawalError::NotFound(id))?;

        withdrawal.confirm(chrono::Utc::now())?;
        self.withdrawals.save(withdrawal.clone()).await;

        let wallet = self
            .wallets
            .settle_withdrawal(withdrawal.wallet_id, withdrawal.amount)
            .await?;
        info!(
            withdrawal = %withdrawal.id,
            wallet = %wallet.id,
            total_withdrawn = %wallet.total_withdrawn,
            "withdrawal confirmed"
        );
        Ok(withdrawal)
    }

    /// -> FAILED: restore the wallet to its exact pre-request state.
    pub async fn fail(
        &self,
        id: WithdrawalId,
        reason: impl Into<String>,
    ) -> Result<Withdrawal, WithdrawalError> {
        let mut withdrawal = self
            .withdrawals
            .get(id)
            .await
            .ok_or(WithdrawalError::NotFound(id))?;

        withdrawal.fail(reason, chrono::Utc::now())?;
        self.withdrawals.save(withdrawal.clone()).await;

        let wallet = self
            .wallets
            .release_locked(withdrawal.wallet_id, withdrawal.amount)
            .await?;
        warn!(
            withdrawal = %withdrawal.id,
            wallet = %wallet.id,
            reason = withdrawal.error_message.as_deref().unwrap_or(""),
            "withdrawal failed; locked funds restored"
        );
        Ok(withdrawal)
    }

    /// Re-drive non-terminal withdrawals found at startup. PENDING rows run
    /// the full settlement path again; PROCESSING rows only await their
    /// confirmation leg.
    pub async fn recover_inflight(&self) -> usize {
        let inflight = self.withdrawals.get_inflight().await;
        let count = inflight.len();
        for withdrawal in inflight {
            info!(
                withdrawal = %withdrawal.id,
                status = %withdrawal.status,
                "recovering in-flight withdrawal"
            );
            match withdrawal.status {
                WithdrawalStatus::Pending => self.spawn_settlement(withdrawal.id),
                WithdrawalStatus::Processing => self.spawn_confirmation(withdrawal.id),
                _ => {}
            }
        }
        count
    }

    fn spawn_settlement(&self, id: WithdrawalId) {
        let ledger = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ledger.timing.processing_delay).await;
            match ledger.process(id).await {
                Ok(_) => {
                    tokio::time::sleep(ledger.timing.confirmation_delay).await;
                    if let Err(e) = ledger.confirm(id).await {
                        error!(withdrawal = %id, error = %e, "settlement confirmation failed");
                    }
                }
                Err(e) => {
                    warn!(withdrawal = %id, error = %e, "settlement submission failed");
                    if let Err(e) = ledger.fail(id, e.to_string()).await {
                        error!(withdrawal = %id, error = %e, "could not fail withdrawal");
                    }
                }
            }
        });
    }

    fn spawn_confirmation(&self, id: WithdrawalId) {
        let ledger = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ledger.timing.confirmation_delay).await;
            if let Err(e) = ledger.confirm(id).await {
                error!(withdrawal = %id, error = %e, "settlement confirmation failed");
            }
        });
    }
}

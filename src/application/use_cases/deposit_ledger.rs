//! Deposit ledger use case: idempotently record and confirm deposits
//!
//! Deposit identity is (tx_hash, currency). Re-delivery from either
//! ingestion channel, or redundant manual re-processing, credits the wallet
//! exactly once.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::ports::{
    DepositInsert, DepositRepository, GatewayDeposit, GatewayTxStatus, WalletRepository,
};
use crate::domain::{Currency, Deposit, DepositError, DepositId};

use super::deposit_verifier::DepositVerifier;

pub struct DepositLedger<W, D>
where
    W: WalletRepository,
    D: DepositRepository,
{
    wallets: Arc<W>,
    deposits: Arc<D>,
    verifier: DepositVerifier<W>,
    required_confirmations: u32,
}

impl<W, D> DepositLedger<W, D>
where
    W: WalletRepository,
    D: DepositRepository,
{
    pub fn new(
        wallets: Arc<W>,
        deposits: Arc<D>,
        memo_prefix: impl Into<String>,
        required_confirmations: u32,
    ) -> Self {
        let verifier = DepositVerifier::new(Arc::clone(&wallets), memo_prefix);
        Self {
            wallets,
            deposits,
            verifier,
            required_confirmations,
        }
    }

    pub fn verifier(&self) -> &DepositVerifier<W> {
        &self.verifier
    }

    /// The stored deposit for an external identity, if any
    pub async fn find_recorded(&self, tx_hash: &str, currency: &Currency) -> Option<Deposit> {
        self.deposits.find_by_tx(tx_hash, currency).await
    }

    /// Record a deposit event from either ingestion channel.
    ///
    /// An event whose (tx_hash, currency) is already recorded routes to a
    /// status update instead of creating a duplicate. Unverifiable events
    /// are rejected with a log line and never appear in the ledger.
    pub async fn process_deposit(&self, event: &GatewayDeposit) -> Result<Deposit, DepositError> {
        if let Some(existing) = self
            .deposits
            .find_by_tx(&event.tx_id, &event.currency)
            .await
        {
            debug!(deposit = %existing.id, tx = %event.tx_id, "known deposit; updating confirmations");
            return self
                .update_confirmations(existing.id, Some(event.confirmations))
                .await;
        }

        let (wallet, tier) = match self
            .verifier
            .resolve_wallet(
                event.memo.as_deref(),
                &event.to_address,
                &event.currency,
                &event.tx_id,
            )
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(
                    tx = %event.tx_id,
                    to = %event.to_address,
                    currency = %event.currency,
                    "rejecting unattributable deposit"
                );
                return Err(e);
            }
        };

        let mut deposit = Deposit::new(
            wallet.id,
            &event.tx_id,
            event.currency.clone(),
            event.amount,
            event.confirmations,
            self.required_confirmations,
            &event.to_address,
            tier,
        );
        if let Some(from) = &event.from_address {
            deposit = deposit.with_from_address(from);
        }
        if let Some(memo) = &event.memo {
            deposit = deposit.with_memo(memo);
        }

        let deposit = match self.deposits.insert_unique(deposit).await {
            DepositInsert::Created(d) => d,
            // Lost the race against the other channel; route to update
            DepositInsert::Duplicate(existing) => {
                return self
                    .update_confirmations(existing.id, Some(event.confirmations))
                    .await;
            }
        };

        info!(
            deposit = %deposit.id,
            wallet = %deposit.wallet_id,
            tx = %deposit.tx_hash,
            amount = %deposit.amount,
            tier = %deposit.verification,
            "deposit recorded"
        );

        if event.status == GatewayTxStatus::Confirmed && deposit.meets_threshold() {
            return self.confirm_deposit(deposit.id).await;
        }
        Ok(deposit)
    }

    /// Confirm a deposit and credit the wallet. Idempotent: a no-op once
    /// CONFIRMED, so re-running after a partial failure is safe.
    pub async fn confirm_deposit(&self, id: DepositId) -> Result<Deposit, DepositError> {
        let mut deposit = self
            .deposits
            .get(id)
            .await
            .ok_or(DepositError::NotFound(id))?;

        if !deposit.mark_confirmed(chrono::Utc::now()) {
            return Ok(deposit);
        }
        self.deposits.save(deposit.clone()).await;

        let wallet = self
            .wallets
            .credit_deposit(deposit.wallet_id, deposit.amount)
            .await?;
        info!(
            deposit = %deposit.id,
            wallet = %wallet.id,
            amount = %deposit.amount,
            balance = %wallet.balance,
            "deposit confirmed and credited"
        );
        Ok(deposit)
    }

    /// Update confirmations for a recorded deposit, confirming it when the
    /// count crosses the threshold. The exchange-reported status alone never
    /// confirms: the threshold is ours, and redelivering an identical event
    /// must not change the outcome.
    pub async fn update_confirmations(
        &self,
        id: DepositId,
        confirmations: Option<u32>,
    ) -> Result<Deposit, DepositError> {
        let mut deposit = self
            .deposits
            .get(id)
            .await
            .ok_or(DepositError::NotFound(id))?;

        if deposit.is_confirmed() {
            return Ok(deposit);
        }

        if let Some(count) = confirmations {
            deposit.confirmations = count;
            self.deposits.save(deposit.clone()).await;
        }

        if deposit.meets_threshold() {
            return self.confirm_deposit(id).await;
        }
        Ok(deposit)
    }
}

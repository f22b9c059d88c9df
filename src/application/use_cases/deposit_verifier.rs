//! Deposit verification: matches an inbound deposit to a wallet
//!
//! Memo first (the memo is bound to exactly one wallet, so it cannot be
//! spoofed by an unrelated depositor), destination address second. Neither
//! matching means the deposit is unattributable; the caller must reject it
//! rather than guess.

use std::sync::Arc;

use crate::application::ports::WalletRepository;
use crate::domain::{Currency, DepositError, DepositMemo, MemoIdentity, VerificationTier, Wallet};

pub struct DepositVerifier<W>
where
    W: WalletRepository,
{
    wallets: Arc<W>,
    memo_prefix: String,
}

impl<W> DepositVerifier<W>
where
    W: WalletRepository,
{
    pub fn new(wallets: Arc<W>, memo_prefix: impl Into<String>) -> Self {
        Self {
            wallets,
            memo_prefix: memo_prefix.into(),
        }
    }

    /// Parse a raw memo into the identity it encodes; `None` for anything
    /// not matching the 4-segment prefixed wire format.
    pub fn parse_memo(&self, raw: &str) -> Option<MemoIdentity> {
        DepositMemo::parse(&self.memo_prefix, raw)
    }

    /// Resolve the wallet an inbound transfer belongs to.
    pub async fn resolve_wallet(
        &self,
        memo: Option<&str>,
        to_address: &str,
        currency: &Currency,
        tx_hash: &str,
    ) -> Result<(Wallet, VerificationTier), DepositError> {
        if let Some(raw) = memo {
            if self.parse_memo(raw).is_some() {
                if let Some(wallet) = self.wallets.find_by_memo(raw, currency).await {
                    return Ok((wallet, VerificationTier::VerifiedByMemo));
                }
            }
        }

        if let Some(wallet) = self.wallets.find_by_address(to_address).await {
            return Ok((wallet, VerificationTier::VerifiedByAddress));
        }

        Err(DepositError::Unverifiable {
            tx_hash: tx_hash.to_string(),
            to_address: to_address.to_string(),
        })
    }
}

//! Chain/network metadata for deposit routing
//!
//! The gateway is the source of truth for which networks a currency can be
//! deposited over. When it errs or returns nothing, callers substitute the
//! static fallback table below for common currencies rather than failing.

use serde::{Deserialize, Serialize};

use super::Currency;

/// One network over which a currency can be deposited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRoute {
    /// Network tag (e.g. "BTC", "ERC20", "SOL")
    pub network: String,
    /// Whether deposits are currently enabled on this route
    pub deposit_enabled: bool,
    /// Whether this route requires a memo/tag to attribute deposits
    pub requires_memo: bool,
    /// Confirmations required before a deposit is considered final
    pub min_confirmations: u32,
    /// Token contract address, for token routes
    pub contract: Option<String>,
}

impl NetworkRoute {
    pub fn new(network: impl Into<String>, min_confirmations: u32) -> Self {
        Self {
            network: network.into(),
            deposit_enabled: true,
            requires_memo: false,
            min_confirmations,
            contract: None,
        }
    }

    pub fn with_memo_required(mut self) -> Self {
        self.requires_memo = true;
        self
    }

    pub fn with_contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }
}

/// Static fallback routes for common currencies.
///
/// Returns an empty vec for currencies outside the table; the caller decides
/// whether that is an error.
pub fn fallback_routes(currency: &Currency) -> Vec<NetworkRoute> {
    match currency.as_str() {
        "BTC" => vec![NetworkRoute::new("BTC", 2)],
        "ETH" => vec![NetworkRoute::new("ERC20", 6)],
        "USDT" => vec![
            NetworkRoute::new("ERC20", 6)
                .with_contract("0xdac17f958d2ee523a2206206994597c13d831ec7"),
            NetworkRoute::new("TRC20", 20),
        ],
        "SOL" => vec![NetworkRoute::new("SOL", 32)],
        "LTC" => vec![NetworkRoute::new("LTC", 6)],
        "XRP" => vec![NetworkRoute::new("XRP", 1).with_memo_required()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_covers_common_currencies() {
        for code in ["BTC", "ETH", "USDT", "SOL", "LTC"] {
            assert!(
                !fallback_routes(&Currency::new(code)).is_empty(),
                "missing fallback for {code}"
            );
        }
    }

    #[test]
    fn test_unknown_currency_has_no_routes() {
        assert!(fallback_routes(&Currency::new("NOPE")).is_empty());
    }

    #[test]
    fn test_memo_required_route() {
        let routes = fallback_routes(&Currency::new("XRP"));
        assert!(routes[0].requires_memo);
    }
}

mod chain;
mod currency;
mod memo;

pub use chain::{NetworkRoute, fallback_routes};
pub use currency::Currency;
pub use memo::{DepositMemo, MemoError, MemoIdentity};

/// Timestamp type used across the ledger
pub type Timestamp = chrono::DateTime<chrono::Utc>;

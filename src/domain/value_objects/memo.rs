//! Deposit memo wire format
//!
//! The memo is the verification token embedded in a deposit's narration/tag
//! field. Wire format (bit-exact, the only contract the external world must
//! honor): `PREFIX-{userId}-{tenantId}-{8 hex chars}`, exactly 4
//! dash-delimited segments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity recovered from a parsed deposit memo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoIdentity {
    pub user_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoError {
    #[error("memo segment may not be empty")]
    EmptySegment,
    #[error("memo segment may not contain '-': {0}")]
    DashInSegment(String),
}

/// A generated deposit verification memo
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepositMemo(String);

impl DepositMemo {
    /// Generate a memo for a (user, tenant) pair with a random 8-hex suffix.
    ///
    /// Ids containing `-` cannot round-trip the 4-segment wire format and
    /// are rejected.
    pub fn generate(prefix: &str, user_id: &str, tenant_id: &str) -> Result<Self, MemoError> {
        for segment in [prefix, user_id, tenant_id] {
            if segment.is_empty() {
                return Err(MemoError::EmptySegment);
            }
            if segment.contains('-') {
                return Err(MemoError::DashInSegment(segment.to_string()));
            }
        }
        let suffix = format!("{:08x}", rand::random::<u32>());
        Ok(Self(format!("{}-{}-{}-{}", prefix, user_id, tenant_id, suffix)))
    }

    /// Parse a raw memo back into the identity it encodes.
    ///
    /// Returns `None` unless the memo carries the expected prefix and has
    /// exactly 4 dash-delimited, non-empty segments. Never panics.
    pub fn parse(prefix: &str, raw: &str) -> Option<MemoIdentity> {
        let segments: Vec<&str> = raw.split('-').collect();
        if segments.len() != 4 {
            return None;
        }
        if segments[0] != prefix {
            return None;
        }
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(MemoIdentity {
            user_id: segments[1].to_string(),
            tenant_id: segments[2].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for DepositMemo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

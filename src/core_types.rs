//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

use std::fmt;
use std::str::FromStr;

/// User ID - globally unique, immutable after assignment.
///
/// Identifies the holder of accounts and the initiator of transactions.
/// The session layer resolves it; the engine trusts it.
pub type UserId = u64;

/// Account ID - internal primary key of a ledger account.
///
/// Never shown to end users for lookup; external callers address
/// destination accounts by their 16-digit account number instead.
pub type AccountId = u64;

/// Amount in minor currency units (e.g. 1 VND, 1 cent).
///
/// Unsigned, so a balance can never be represented as negative.
pub type Amount = u64;

/// Unix timestamp in milliseconds
pub type TimestampMs = i64;

/// Transaction reference - ULID-based, externally visible identifier
///
/// ULIDs are monotonic and sortable, which keeps `ORDER BY reference`
/// equivalent to creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionRef(ulid::Ulid);

impl TransactionRef {
    /// Generate a new unique reference
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionRef {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s.trim())?))
    }
}

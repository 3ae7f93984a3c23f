//! Transaction Status Definitions
//!
//! Status IDs are stored in PostgreSQL as SMALLINT.

use std::fmt;

/// Transaction FSM States
///
/// ```text
/// PENDING ──► PROCESSING ──► COMPLETED
///    │            │
///    │            └────────► FAILED
///    ├──────────────────────► FAILED
///    └──────────────────────► CANCELLED
/// ```
///
/// Terminal states: COMPLETED (40), FAILED (-10), CANCELLED (-20)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransactionStatus {
    /// Recorded, waiting for the code
    Pending = 0,

    /// Intent record of the settlement saga. Ledger legs may be in flight.
    Processing = 10,

    /// Terminal: all legs posted
    Completed = 40,

    /// Terminal: with a failure reason
    Failed = -10,

    /// Terminal: withdrawn by the initiator before verification
    Cancelled = -20,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Cancelled
        )
    }

    /// Allowed edges of the state machine
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            10 => Some(TransactionStatus::Processing),
            40 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Failed),
            -20 => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Processing => "PROCESSING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "PROCESSING" => Ok(TransactionStatus::Processing),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

//! Ledger Error Types

use thiserror::Error;

use crate::core_types::{AccountId, Amount, TransactionRef};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account {0} is inactive")]
    InactiveAccount(AccountId),

    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Amount,
        requested: Amount,
    },

    #[error("Account number already exists: {0}")]
    DuplicateAccountNumber(String),

    #[error("Balance of account {0} would overflow")]
    Overflow(AccountId),

    #[error("Transaction {0} is closed to further postings")]
    Closed(TransactionRef),

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::InactiveAccount(_) => "ACCOUNT_INACTIVE",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::DuplicateAccountNumber(_) => "DUPLICATE_ACCOUNT_NUMBER",
            LedgerError::Overflow(_) => "OVERFLOW",
            LedgerError::Closed(_) => "REFERENCE_CLOSED",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// The ledger definitively refused the posting.
    ///
    /// `Storage` errors are not rejections: the posting may or may not have
    /// been applied, and only the posting journal can tell.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, LedgerError::Storage(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(LedgerError::InactiveAccount(1).code(), "ACCOUNT_INACTIVE");
        assert_eq!(
            LedgerError::InsufficientFunds {
                account_id: 1,
                balance: 5,
                requested: 10
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
    }

    #[test]
    fn test_is_rejection() {
        assert!(LedgerError::InactiveAccount(1).is_rejection());
        assert!(LedgerError::Overflow(1).is_rejection());
        assert!(LedgerError::Closed(TransactionRef::new()).is_rejection());
        assert!(!LedgerError::Storage("timeout".into()).is_rejection());
    }
}

//! Transaction Error Types

use thiserror::Error;

use crate::account::ValidationError;
use crate::core_types::Amount;
use crate::ledger::LedgerError;
use crate::money::MoneyError;
use crate::otp::OtpError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    // === Validation Errors ===
    #[error("Amount {amount} is below the minimum of {minimum}")]
    AmountTooSmall { amount: Amount, minimum: Amount },

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    #[error("Currency mismatch: {source_currency} to {destination_currency}")]
    CurrencyMismatch {
        source_currency: String,
        destination_currency: String,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    // === Account Errors ===
    #[error("Source account not found or not usable")]
    SourceAccountUnavailable,

    #[error("Destination account not found or not usable")]
    DestinationAccountUnavailable,

    #[error("Insufficient funds")]
    InsufficientFunds,

    // === Verification Errors ===
    #[error("Invalid verification code, {attempts_remaining} attempt(s) remaining")]
    InvalidCode { attempts_remaining: u8 },

    #[error("No active verification code found")]
    ChallengeNotFound,

    #[error("Verification code has expired")]
    ChallengeExpired,

    #[error("Too many invalid verification attempts")]
    TooManyAttempts,

    #[error("Identity verification required (status: {status})")]
    IdentityNotVerified { status: String },

    // === Lifecycle Errors ===
    #[error("Transaction not found")]
    NotFound,

    #[error("Transaction execution failed: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl TransactionError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::AmountTooSmall { .. } => "AMOUNT_TOO_SMALL",
            TransactionError::SameAccount => "SAME_ACCOUNT",
            TransactionError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            TransactionError::Validation(_) => "VALIDATION_ERROR",
            TransactionError::SourceAccountUnavailable => "SOURCE_ACCOUNT_UNAVAILABLE",
            TransactionError::DestinationAccountUnavailable => "DESTINATION_ACCOUNT_UNAVAILABLE",
            TransactionError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransactionError::InvalidCode { .. } => "INVALID_CODE",
            TransactionError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            TransactionError::ChallengeExpired => "CHALLENGE_EXPIRED",
            TransactionError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            TransactionError::IdentityNotVerified { .. } => "IDENTITY_NOT_VERIFIED",
            TransactionError::NotFound => "TRANSACTION_NOT_FOUND",
            TransactionError::Execution(_) => "EXECUTION_FAILED",
            TransactionError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransactionError::AmountTooSmall { .. }
            | TransactionError::SameAccount
            | TransactionError::CurrencyMismatch { .. }
            | TransactionError::Validation(_)
            | TransactionError::InvalidCode { .. }
            | TransactionError::ChallengeNotFound
            | TransactionError::ChallengeExpired => 400,
            TransactionError::IdentityNotVerified { .. } => 403,
            TransactionError::NotFound => 404,
            TransactionError::SourceAccountUnavailable
            | TransactionError::DestinationAccountUnavailable
            | TransactionError::InsufficientFunds => 422,
            TransactionError::TooManyAttempts => 429,
            TransactionError::Execution(_) | TransactionError::Storage(_) => 500,
        }
    }
}

impl From<LedgerError> for TransactionError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientFunds { .. } => TransactionError::InsufficientFunds,
            LedgerError::Overflow(_) => TransactionError::Validation(e.to_string()),
            LedgerError::Storage(msg) => TransactionError::Storage(msg),
            other => TransactionError::Execution(other.to_string()),
        }
    }
}

impl From<OtpError> for TransactionError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::ChallengeNotFound => TransactionError::ChallengeNotFound,
            OtpError::ChallengeExpired => TransactionError::ChallengeExpired,
            OtpError::InvalidCode { attempts_remaining } => {
                TransactionError::InvalidCode { attempts_remaining }
            }
            OtpError::Storage(msg) => TransactionError::Storage(msg),
            other => TransactionError::Execution(other.to_string()),
        }
    }
}

impl From<ValidationError> for TransactionError {
    fn from(e: ValidationError) -> Self {
        TransactionError::Validation(e.to_string())
    }
}

impl From<MoneyError> for TransactionError {
    fn from(e: MoneyError) -> Self {
        TransactionError::Validation(e.to_string())
    }
}

impl From<sqlx::Error> for TransactionError {
    fn from(e: sqlx::Error) -> Self {
        TransactionError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransactionError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransactionError::InsufficientFunds.code(), "INSUFFICIENT_FUNDS");
        assert_eq!(TransactionError::TooManyAttempts.code(), "TOO_MANY_ATTEMPTS");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(TransactionError::NotFound.http_status(), 404);
        assert_eq!(TransactionError::InsufficientFunds.http_status(), 422);
        assert_eq!(
            TransactionError::IdentityNotVerified {
                status: "PENDING".into()
            }
            .http_status(),
            403
        );
        assert_eq!(TransactionError::Storage("db".into()).http_status(), 500);
    }

    #[test]
    fn test_from_otp_error() {
        assert_eq!(
            TransactionError::from(OtpError::InvalidCode {
                attempts_remaining: 2
            }),
            TransactionError::InvalidCode {
                attempts_remaining: 2
            }
        );
        assert_eq!(
            TransactionError::from(OtpError::ChallengeExpired),
            TransactionError::ChallengeExpired
        );
    }

    #[test]
    fn test_from_ledger_error() {
        let err = LedgerError::InsufficientFunds {
            account_id: 1,
            balance: 5,
            requested: 10,
        };
        assert_eq!(TransactionError::from(err), TransactionError::InsufficientFunds);
        assert!(matches!(
            TransactionError::from(LedgerError::Storage("io".into())),
            TransactionError::Storage(_)
        ));
    }
}

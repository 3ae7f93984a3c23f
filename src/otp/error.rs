//! OTP Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    #[error("No active verification code found")]
    ChallengeNotFound,

    #[error("Verification code has expired")]
    ChallengeExpired,

    #[error("Invalid verification code, {attempts_remaining} attempt(s) remaining")]
    InvalidCode { attempts_remaining: u8 },

    #[error("Code hashing failed: {0}")]
    Hashing(String),

    #[error("Code delivery failed: {0}")]
    Delivery(String),

    #[error("OTP storage error: {0}")]
    Storage(String),
}

impl OtpError {
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::ChallengeNotFound => "CHALLENGE_NOT_FOUND",
            OtpError::ChallengeExpired => "CHALLENGE_EXPIRED",
            OtpError::InvalidCode { .. } => "INVALID_CODE",
            OtpError::Hashing(_) => "HASHING_ERROR",
            OtpError::Delivery(_) => "DELIVERY_ERROR",
            OtpError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// The last permitted attempt was just spent
    pub fn is_exhausted(&self) -> bool {
        matches!(
            self,
            OtpError::InvalidCode {
                attempts_remaining: 0
            }
        )
    }
}

impl From<sqlx::Error> for OtpError {
    fn from(e: sqlx::Error) -> Self {
        OtpError::Storage(e.to_string())
    }
}

impl From<argon2::password_hash::Error> for OtpError {
    fn from(e: argon2::password_hash::Error) -> Self {
        OtpError::Hashing(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_exhausted() {
        assert!(
            OtpError::InvalidCode {
                attempts_remaining: 0
            }
            .is_exhausted()
        );
        assert!(
            !OtpError::InvalidCode {
                attempts_remaining: 1
            }
            .is_exhausted()
        );
        assert!(!OtpError::ChallengeNotFound.is_exhausted());
    }

    #[test]
    fn test_display() {
        let err = OtpError::InvalidCode {
            attempts_remaining: 2,
        };
        assert_eq!(
            err.to_string(),
            "Invalid verification code, 2 attempt(s) remaining"
        );
    }
}

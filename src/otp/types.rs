//! OTP challenge types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_types::{TimestampMs, UserId};

/// What a code authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum OtpPurpose {
    Login = 1,
    Transaction = 2,
    Utility = 3,
    PasswordReset = 4,
    PhoneVerification = 5,
}

impl OtpPurpose {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(OtpPurpose::Login),
            2 => Some(OtpPurpose::Transaction),
            3 => Some(OtpPurpose::Utility),
            4 => Some(OtpPurpose::PasswordReset),
            5 => Some(OtpPurpose::PhoneVerification),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "LOGIN",
            OtpPurpose::Transaction => "TRANSACTION",
            OtpPurpose::Utility => "UTILITY",
            OtpPurpose::PasswordReset => "PASSWORD_RESET",
            OtpPurpose::PhoneVerification => "PHONE_VERIFICATION",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Challenge ID - UUID v4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(Uuid);

impl ChallengeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChallengeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Stored challenge. Holds only the argon2 PHC hash of the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub user_id: UserId,
    pub purpose: OtpPurpose,
    pub reference: Option<String>,
    pub code_hash: String,
    pub created_at: TimestampMs,
    pub expires_at: TimestampMs,
    pub consumed: bool,
    pub attempts: u8,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: TimestampMs) -> bool {
        now >= self.expires_at
    }

    /// Unconsumed, unexpired and with attempts remaining
    pub fn is_live(&self, now: TimestampMs, max_attempts: u8) -> bool {
        !self.consumed && !self.is_expired(now) && self.attempts < max_attempts
    }

    /// Matches the lookup key. A `None` reference filter matches any reference.
    pub fn matches(&self, user_id: UserId, purpose: OtpPurpose, reference: Option<&str>) -> bool {
        self.user_id == user_id
            && self.purpose == purpose
            && reference.is_none_or(|r| self.reference.as_deref() == Some(r))
    }
}

/// Handle returned to the caller of `issue`
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct IssuedChallenge {
    #[schema(value_type = String)]
    pub challenge_id: ChallengeId,
    pub expires_at: TimestampMs,
    /// Notifier accepted the code for delivery
    pub delivered: bool,
    /// Plaintext code, development mode only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

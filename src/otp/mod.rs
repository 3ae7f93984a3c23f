//! One-Time-Code Challenge Manager
//!
//! Short-lived numeric codes bound to a user, a purpose and optionally a
//! transaction reference.
//!
//! - Codes are drawn uniformly from the OS CSPRNG and stored only as salted
//!   argon2id PHC strings.
//! - A challenge verifies at most once, only before expiry, and only while
//!   attempts remain (3 by default).
//! - The plaintext is handed to a [`Notifier`] and is returned to the caller
//!   only in development mode (`otp.expose_codes` with the `dev-otp` feature).

pub mod db;
pub mod error;
pub mod hasher;
pub mod manager;
pub mod notifier;
pub mod store;
pub mod types;

use serde::{Deserialize, Serialize};

pub use db::PgOtpStore;
pub use error::OtpError;
pub use hasher::{CodeHasher, HashParams};
pub use manager::ChallengeManager;
pub use notifier::{
    CodeDelivery, LogNotifier, MemoryNotifier, Notifier, NotifierConfig, NotifierKind,
    WebhookNotifier,
};
pub use store::{InMemoryOtpStore, OtpStore};
pub use types::{ChallengeId, IssuedChallenge, OtpChallenge, OtpPurpose};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub code_length: u8,
    pub ttl_secs: u64,
    pub max_attempts: u8,
    /// Return plaintext codes to API callers. Honoured only with `dev-otp`.
    pub expose_codes: bool,
    pub hash: HashParams,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl_secs: 300,
            max_attempts: 3,
            expose_codes: false,
            hash: HashParams::default(),
        }
    }
}

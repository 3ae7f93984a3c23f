//! Account model and input validation
//!
//! Balances are owned by the [`crate::ledger`]; this module only defines
//! what an account is and how external account numbers are canonicalized.

pub mod models;
pub mod validation;

// Re-export commonly used types
pub use models::{Account, AccountKind, NewAccount};
pub use validation::{AccountNumber, ValidationError, canonicalize_account_number};

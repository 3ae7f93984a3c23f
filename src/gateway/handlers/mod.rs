//! HTTP handlers

pub mod health;
pub mod helpers;
pub mod officer;
pub mod payment;
pub mod transaction;
pub mod transfer;
pub mod withdrawal;

pub use health::{HealthResponse, health_check};
pub use officer::{officer_deposit, officer_transfer};
pub use payment::{initiate_utility_payment, verify_utility_payment};
pub use transaction::{get_transaction, list_transactions};
pub use transfer::{initiate_transfer, verify_transfer};
pub use withdrawal::{initiate_withdrawal, verify_withdrawal};

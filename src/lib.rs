//! Retail Ledger - funds transfer engine
//!
//! Customer transfers, utility payments and withdrawals are two-phase:
//! initiate (PENDING, a one-time code is sent) and verify (the code is
//! checked, then the saga settles the ledger). Bank officers have a
//! separately authorized single-phase path.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (UserId, AccountId, TransactionRef, etc.)
//! - [`money`] - Currency and amount display
//! - [`time`] - Injectable time sources
//! - [`account`] - Account model and account-number canonicalization
//! - [`ledger`] - Balances and idempotent postings
//! - [`fee`] - Fee schedule
//! - [`otp`] - One-time-code challenges
//! - [`transaction`] - Transaction state machine, settlement saga, recovery worker
//! - [`db`] - PostgreSQL pool and schema
//! - [`config`] / [`logging`] / [`bootstrap`] - Process wiring
//! - [`gateway`] - HTTP API

// Core types - must be first!
pub mod core_types;

pub mod money;
pub mod time;

// Domain
pub mod account;
pub mod fee;
pub mod ledger;
pub mod otp;
pub mod transaction;

// Infrastructure
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Amount, TimestampMs, TransactionRef, UserId};
pub use ledger::{InMemoryLedger, Ledger, LedgerError};
pub use money::Currency;
pub use otp::ChallengeManager;
pub use transaction::{
    RecoveryWorker, TransactionEngine, TransactionError, TransactionRecord, TransactionStatus,
};

//! Account Ledger
//!
//! Owns balances. Every balance change is a *posting* keyed by
//! `(transaction reference, leg)` and recorded atomically with the change it
//! describes, which gives two properties the transaction engine relies on:
//!
//! 1. **Idempotency**: replaying a posting is a no-op, so a saga step can be
//!    retried after an ambiguous failure.
//! 2. **Discoverability**: [`Ledger::postings`] tells reconciliation exactly
//!    which legs of an interrupted transaction actually happened.
//!
//! A REFUND or VOID posting closes its reference: any leg not already
//! applied is refused with [`LedgerError::Closed`]. VOID ([`Ledger::void`])
//! marks a transaction reconciliation abandoned before its debit.
//!
//! Debits are guarded (`active && balance >= amount`) inside the same atomic
//! section as the decrement, so a balance can never go negative under any
//! interleaving.

pub mod error;
pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

use crate::account::{Account, NewAccount};
use crate::core_types::{AccountId, Amount, TimestampMs, TransactionRef, UserId};

/// Posting leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(i16)]
pub enum Leg {
    /// Source debited by the transaction total
    Debit = 1,
    /// Destination credited by the principal
    Credit = 2,
    /// Compensating credit of a debited source
    Refund = 3,
    /// Fee credited to the fee-sink account
    Fee = 4,
    /// Zero-amount marker closing a reference that was never debited
    Void = 5,
}

impl Leg {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Leg::Debit),
            2 => Some(Leg::Credit),
            3 => Some(Leg::Refund),
            4 => Some(Leg::Fee),
            5 => Some(Leg::Void),
            _ => None,
        }
    }

    /// Legs after which a reference accepts no new postings
    pub fn closes_reference(&self) -> bool {
        matches!(self, Leg::Refund | Leg::Void)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Debit => "DEBIT",
            Leg::Credit => "CREDIT",
            Leg::Refund => "REFUND",
            Leg::Fee => "FEE",
            Leg::Void => "VOID",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key of a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostingKey {
    pub reference: TransactionRef,
    pub leg: Leg,
}

impl PostingKey {
    pub fn new(reference: TransactionRef, leg: Leg) -> Self {
        Self { reference, leg }
    }
}

impl fmt::Display for PostingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.reference, self.leg)
    }
}

/// A recorded balance change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub reference: TransactionRef,
    pub leg: Leg,
    pub account_id: AccountId,
    pub amount: Amount,
    pub created_at: TimestampMs,
}

/// Ledger backend
///
/// Implementations must make `debit`/`credit` atomic per account and
/// idempotent per [`PostingKey`]: a repeated key returns the current account
/// without touching the balance.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Provision an account (bootstrap and tests only)
    async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError>;

    async fn get(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Look up by external account number; input is canonicalized first
    async fn find_by_number(&self, raw: &str) -> Result<Option<Account>, LedgerError>;

    /// A holder's accounts, oldest first
    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>, LedgerError>;

    /// Advisory check: active and `balance >= amount`.
    ///
    /// Unknown accounts cannot be debited.
    async fn can_debit(&self, id: AccountId, amount: Amount) -> Result<bool, LedgerError> {
        Ok(self
            .get(id)
            .await?
            .is_some_and(|account| account.can_debit(amount)))
    }

    async fn debit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError>;

    async fn credit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError>;

    /// Close `reference` to further postings unless its DEBIT is already applied.
    ///
    /// The VOID posting is recorded against `account_id` with a zero amount.
    /// Returns `false` when the debit got there first; voiding twice is a
    /// no-op returning `true`.
    async fn void(&self, reference: TransactionRef, account_id: AccountId)
    -> Result<bool, LedgerError>;

    /// Posting journal of one transaction
    async fn postings(&self, reference: TransactionRef) -> Result<Vec<Posting>, LedgerError>;

    /// Soft-deactivate; accounts are never deleted
    async fn deactivate(&self, id: AccountId) -> Result<Account, LedgerError>;
}

//! In-memory ledger backend
//!
//! One mutex per account; the posting journal shard for a reference is locked
//! only while that account mutex is held, so the lock order is always
//! account -> journal. Nothing is held across an `.await`: every trait method
//! delegates to a synchronous helper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Leg, Ledger, LedgerError, Posting, PostingKey};
use crate::account::{Account, AccountNumber, NewAccount, canonicalize_account_number};
use crate::core_types::{AccountId, Amount, TransactionRef, UserId};
use crate::time::TimeSource;

pub struct InMemoryLedger {
    accounts: DashMap<AccountId, Arc<Mutex<Account>>>,
    numbers: DashMap<String, AccountId>,
    journal: DashMap<TransactionRef, Vec<Posting>>,
    next_id: AtomicU64,
    clock: Arc<dyn TimeSource>,
}

enum Direction {
    Debit,
    Credit,
}

fn lock(account: &Mutex<Account>) -> MutexGuard<'_, Account> {
    account.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryLedger {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            journal: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock,
        }
    }

    fn handle(&self, id: AccountId) -> Result<Arc<Mutex<Account>>, LedgerError> {
        self.accounts
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn snapshot(&self, id: AccountId) -> Option<Account> {
        let handle = self.accounts.get(&id).map(|e| Arc::clone(e.value()))?;
        let account = lock(&handle).clone();
        Some(account)
    }

    fn open_sync(&self, new: NewAccount) -> Result<Account, LedgerError> {
        let number = match new.number {
            Some(number) => number,
            None => loop {
                let candidate = AccountNumber::generate();
                if !self.numbers.contains_key(candidate.as_str()) {
                    break candidate;
                }
            },
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match self.numbers.entry(number.as_str().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(LedgerError::DuplicateAccountNumber(number.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = self.clock.now_ms();
        let account = Account {
            id,
            number,
            owner: new.owner,
            kind: new.kind,
            balance: new.opening_balance,
            currency: new.currency,
            interest_rate: new.interest_rate,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.accounts
            .insert(id, Arc::new(Mutex::new(account.clone())));
        Ok(account)
    }

    fn post_sync(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
        direction: Direction,
    ) -> Result<Account, LedgerError> {
        let handle = self.handle(id)?;
        let mut account = lock(&handle);
        let mut postings = self.journal.entry(key.reference).or_default();

        if postings.iter().any(|p| p.leg == key.leg) {
            tracing::debug!(posting = %key, account_id = id, "Posting already applied");
            return Ok(account.clone());
        }
        if postings.iter().any(|p| p.leg.closes_reference()) {
            return Err(LedgerError::Closed(key.reference));
        }
        if !account.is_active {
            return Err(LedgerError::InactiveAccount(id));
        }

        let balance = match direction {
            Direction::Debit => {
                if account.balance < amount {
                    return Err(LedgerError::InsufficientFunds {
                        account_id: id,
                        balance: account.balance,
                        requested: amount,
                    });
                }
                account.balance - amount
            }
            Direction::Credit => account
                .balance
                .checked_add(amount)
                .ok_or(LedgerError::Overflow(id))?,
        };

        let now = self.clock.now_ms();
        account.balance = balance;
        account.updated_at = now;
        postings.push(Posting {
            reference: key.reference,
            leg: key.leg,
            account_id: id,
            amount,
            created_at: now,
        });
        Ok(account.clone())
    }

    fn void_sync(&self, reference: TransactionRef, account_id: AccountId) -> bool {
        let mut postings = self.journal.entry(reference).or_default();
        if postings.iter().any(|p| p.leg == Leg::Debit) {
            return false;
        }
        if !postings.iter().any(|p| p.leg == Leg::Void) {
            postings.push(Posting {
                reference,
                leg: Leg::Void,
                account_id,
                amount: 0,
                created_at: self.clock.now_ms(),
            });
        }
        true
    }

    fn deactivate_sync(&self, id: AccountId) -> Result<Account, LedgerError> {
        let handle = self.handle(id)?;
        let mut account = lock(&handle);
        account.is_active = false;
        account.updated_at = self.clock.now_ms();
        Ok(account.clone())
    }

    /// Sum of all balances; conservation checks in tests
    pub fn total_balance(&self) -> u128 {
        self.accounts
            .iter()
            .map(|entry| lock(entry.value()).balance as u128)
            .sum()
    }

    /// Posting counts per leg across the whole journal
    pub fn leg_counts(&self) -> HashMap<Leg, usize> {
        let mut counts = HashMap::new();
        for entry in self.journal.iter() {
            for posting in entry.value() {
                *counts.entry(posting.leg).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        self.open_sync(new)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        Ok(self.snapshot(id))
    }

    async fn find_by_number(&self, raw: &str) -> Result<Option<Account>, LedgerError> {
        let number = canonicalize_account_number(raw);
        let id = self.numbers.get(&number).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.snapshot(id)))
    }

    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>, LedgerError> {
        let handles: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut owned: Vec<Account> = handles
            .iter()
            .map(|handle| lock(handle).clone())
            .filter(|account| account.owner == owner)
            .collect();
        owned.sort_by_key(|account| (account.created_at, account.id));
        Ok(owned)
    }

    async fn debit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError> {
        self.post_sync(id, amount, key, Direction::Debit)
    }

    async fn credit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError> {
        self.post_sync(id, amount, key, Direction::Credit)
    }

    async fn void(
        &self,
        reference: TransactionRef,
        account_id: AccountId,
    ) -> Result<bool, LedgerError> {
        Ok(self.void_sync(reference, account_id))
    }

    async fn postings(&self, reference: TransactionRef) -> Result<Vec<Posting>, LedgerError> {
        Ok(self
            .journal
            .get(&reference)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn deactivate(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.deactivate_sync(id)
    }
}

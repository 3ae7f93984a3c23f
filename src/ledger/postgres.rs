//! PostgreSQL ledger backend
//!
//! Each posting runs in one SQL transaction:
//! 1. `pg_advisory_xact_lock` on the reference, serializing its postings
//! 2. replay and closed-reference check on `ledger_postings_tb`
//! 3. guarded single-row `UPDATE ... RETURNING` on `accounts_tb`
//! 4. `INSERT ... ON CONFLICT DO NOTHING` of the posting
//!
//! If step 4 inserts nothing, a concurrent replay won and the whole
//! transaction is rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::postgres::PgRow;

use super::{Leg, Ledger, LedgerError, Posting, PostingKey};
use crate::account::{
    Account, AccountKind, AccountNumber, NewAccount, canonicalize_account_number,
};
use crate::core_types::{AccountId, Amount, TransactionRef, UserId};
use crate::db::SafeRow;
use crate::money::{Currency, amount_to_decimal, decimal_to_amount};
use crate::time::{TimeSource, to_datetime};

const ACCOUNT_COLUMNS: &str = "account_id, account_number, owner_id, kind, balance, currency, \
     interest_rate, is_active, created_at, updated_at";

/// Attempts at generating an unused account number
const NUMBER_ATTEMPTS: usize = 5;

pub struct PgLedger {
    pool: PgPool,
    clock: Arc<dyn TimeSource>,
}

#[derive(Clone, Copy)]
enum Direction {
    Debit,
    Credit,
}

impl PgLedger {
    pub fn new(pool: PgPool, clock: Arc<dyn TimeSource>) -> Self {
        Self { pool, clock }
    }

    async fn insert_account(
        &self,
        new: &NewAccount,
        number: &AccountNumber,
    ) -> Result<Account, LedgerError> {
        let now = to_datetime(self.clock.now_ms());
        let sql = format!(
            "INSERT INTO accounts_tb \
                 (account_number, owner_id, kind, balance, currency, interest_rate, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $7) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let result = sqlx::query(&sql)
            .bind(number.as_str())
            .bind(new.owner as i64)
            .bind(new.kind.id())
            .bind(amount_to_decimal(new.opening_balance))
            .bind(new.currency.as_str())
            .bind(new.interest_rate)
            .bind(now)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => row_to_account(&row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerError::DuplicateAccountNumber(number.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn post(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
        direction: Direction,
    ) -> Result<Account, LedgerError> {
        let reference = key.reference.to_string();
        let now = to_datetime(self.clock.now_ms());
        let mut tx = self.pool.begin().await?;

        lock_reference(&mut tx, &reference).await?;

        let legs: Vec<i16> =
            sqlx::query_scalar("SELECT leg FROM ledger_postings_tb WHERE reference = $1")
                .bind(&reference)
                .fetch_all(&mut *tx)
                .await?;
        if legs.contains(&key.leg.id()) {
            tx.rollback().await?;
            tracing::debug!(posting = %key, account_id = id, "Posting already applied");
            return self.get(id).await?.ok_or(LedgerError::AccountNotFound(id));
        }
        if legs
            .iter()
            .filter_map(|leg| Leg::from_id(*leg))
            .any(|leg| leg.closes_reference())
        {
            tx.rollback().await?;
            return Err(LedgerError::Closed(key.reference));
        }

        let sql = match direction {
            Direction::Debit => format!(
                "UPDATE accounts_tb SET balance = balance - $1, updated_at = $2 \
                 WHERE account_id = $3 AND is_active AND balance >= $1 \
                 RETURNING {ACCOUNT_COLUMNS}"
            ),
            Direction::Credit => format!(
                "UPDATE accounts_tb SET balance = balance + $1, updated_at = $2 \
                 WHERE account_id = $3 AND is_active AND balance + $1 <= $4 \
                 RETURNING {ACCOUNT_COLUMNS}"
            ),
        };
        let mut query = sqlx::query(&sql)
            .bind(amount_to_decimal(amount))
            .bind(now)
            .bind(id as i64);
        if let Direction::Credit = direction {
            query = query.bind(amount_to_decimal(u64::MAX));
        }
        let updated = query.fetch_optional(&mut *tx).await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            return Err(self.diagnose(id, amount, direction).await);
        };

        let inserted = sqlx::query(
            "INSERT INTO ledger_postings_tb (reference, leg, account_id, amount, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (reference, leg) DO NOTHING",
        )
        .bind(&reference)
        .bind(key.leg.id())
        .bind(id as i64)
        .bind(amount_to_decimal(amount))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!(posting = %key, account_id = id, "Lost posting race to replay");
            return self.get(id).await?.ok_or(LedgerError::AccountNotFound(id));
        }

        let account = row_to_account(&row)?;
        tx.commit().await?;
        Ok(account)
    }

    /// Explain why a guarded UPDATE matched no row
    async fn diagnose(&self, id: AccountId, amount: Amount, direction: Direction) -> LedgerError {
        match self.get(id).await {
            Ok(None) => LedgerError::AccountNotFound(id),
            Ok(Some(account)) if !account.is_active => LedgerError::InactiveAccount(id),
            Ok(Some(account)) => match direction {
                Direction::Debit => LedgerError::InsufficientFunds {
                    account_id: id,
                    balance: account.balance,
                    requested: amount,
                },
                Direction::Credit => LedgerError::Overflow(id),
            },
            Err(e) => e,
        }
    }
}

async fn lock_reference(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    reference: &str,
) -> Result<(), LedgerError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(reference)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn row_to_account(row: &PgRow) -> Result<Account, LedgerError> {
    let number: String = row.try_get_log("account_number")?;
    let number = AccountNumber::new(&number)
        .map_err(|e| LedgerError::Storage(format!("corrupt account_number: {}", e)))?;

    let kind_id: i16 = row.try_get_log("kind")?;
    let kind = AccountKind::from_id(kind_id)
        .ok_or_else(|| LedgerError::Storage(format!("Invalid account kind: {}", kind_id)))?;

    let currency: String = row.try_get_log("currency")?;
    let currency: Currency = currency
        .parse()
        .map_err(|e| LedgerError::Storage(format!("{}", e)))?;

    let balance: Decimal = row.try_get_log("balance")?;
    let balance =
        decimal_to_amount(balance).map_err(|e| LedgerError::Storage(format!("balance: {}", e)))?;

    let created_at: chrono::DateTime<chrono::Utc> = row.try_get_log("created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = row.try_get_log("updated_at")?;

    Ok(Account {
        id: row.try_get_log::<i64>("account_id")? as AccountId,
        number,
        owner: row.try_get_log::<i64>("owner_id")? as UserId,
        kind,
        balance,
        currency,
        interest_rate: row.try_get_log("interest_rate")?,
        is_active: row.try_get_log("is_active")?,
        created_at: created_at.timestamp_millis(),
        updated_at: updated_at.timestamp_millis(),
    })
}

#[async_trait]
impl Ledger for PgLedger {
    async fn open_account(&self, new: NewAccount) -> Result<Account, LedgerError> {
        if let Some(number) = &new.number {
            return self.insert_account(&new, number).await;
        }
        let mut last_err = None;
        for _ in 0..NUMBER_ATTEMPTS {
            match self.insert_account(&new, &AccountNumber::generate()).await {
                Err(e @ LedgerError::DuplicateAccountNumber(_)) => last_err = Some(e),
                other => return other,
            }
        }
        Err(last_err.unwrap_or_else(|| LedgerError::Storage("account number space".into())))
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>, LedgerError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts_tb WHERE account_id = $1");
        let row = sqlx::query(&sql)
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn find_by_number(&self, raw: &str) -> Result<Option<Account>, LedgerError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts_tb WHERE account_number = $1");
        let row = sqlx::query(&sql)
            .bind(canonicalize_account_number(raw))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>, LedgerError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts_tb WHERE owner_id = $1 \
             ORDER BY created_at ASC, account_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_account).collect()
    }

    async fn debit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError> {
        self.post(id, amount, key, Direction::Debit).await
    }

    async fn credit(
        &self,
        id: AccountId,
        amount: Amount,
        key: &PostingKey,
    ) -> Result<Account, LedgerError> {
        self.post(id, amount, key, Direction::Credit).await
    }

    async fn void(
        &self,
        reference: TransactionRef,
        account_id: AccountId,
    ) -> Result<bool, LedgerError> {
        let key = reference.to_string();
        let mut tx = self.pool.begin().await?;
        lock_reference(&mut tx, &key).await?;

        let debited: Option<i16> = sqlx::query_scalar(
            "SELECT leg FROM ledger_postings_tb WHERE reference = $1 AND leg = $2",
        )
        .bind(&key)
        .bind(Leg::Debit.id())
        .fetch_optional(&mut *tx)
        .await?;
        if debited.is_some() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO ledger_postings_tb (reference, leg, account_id, amount, created_at) \
             VALUES ($1, $2, $3, 0, $4) \
             ON CONFLICT (reference, leg) DO NOTHING",
        )
        .bind(&key)
        .bind(Leg::Void.id())
        .bind(account_id as i64)
        .bind(to_datetime(self.clock.now_ms()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn postings(&self, reference: TransactionRef) -> Result<Vec<Posting>, LedgerError> {
        let rows = sqlx::query(
            "SELECT leg, account_id, amount, created_at FROM ledger_postings_tb \
             WHERE reference = $1 ORDER BY created_at ASC, leg ASC",
        )
        .bind(reference.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let leg_id: i16 = row.try_get_log("leg")?;
                let leg = Leg::from_id(leg_id)
                    .ok_or_else(|| LedgerError::Storage(format!("Invalid leg: {}", leg_id)))?;
                let amount: Decimal = row.try_get_log("amount")?;
                let created_at: chrono::DateTime<chrono::Utc> = row.try_get_log("created_at")?;
                Ok(Posting {
                    reference,
                    leg,
                    account_id: row.try_get_log::<i64>("account_id")? as AccountId,
                    amount: decimal_to_amount(amount)
                        .map_err(|e| LedgerError::Storage(format!("amount: {}", e)))?,
                    created_at: created_at.timestamp_millis(),
                })
            })
            .collect()
    }

    async fn deactivate(&self, id: AccountId) -> Result<Account, LedgerError> {
        let sql = format!(
            "UPDATE accounts_tb SET is_active = FALSE, updated_at = $1 WHERE account_id = $2 \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(to_datetime(self.clock.now_ms()))
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::AccountNotFound(id)),
        }
    }
}

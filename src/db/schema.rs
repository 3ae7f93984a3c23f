//! Idempotent schema creation
//!
//! Run once by the bootstrap step. Every statement is `IF NOT EXISTS`, so
//! re-running against a live database is a no-op.

use sqlx::PgPool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts_tb (
        account_id     BIGSERIAL PRIMARY KEY,
        account_number VARCHAR(16) NOT NULL UNIQUE,
        owner_id       BIGINT NOT NULL,
        kind           SMALLINT NOT NULL,
        balance        NUMERIC(30, 0) NOT NULL CHECK (balance >= 0),
        currency       VARCHAR(3) NOT NULL,
        interest_rate  NUMERIC(8, 4),
        is_active      BOOLEAN NOT NULL DEFAULT TRUE,
        created_at     TIMESTAMPTZ NOT NULL,
        updated_at     TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts_tb (owner_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS ledger_postings_tb (
        reference  VARCHAR(26) NOT NULL,
        leg        SMALLINT NOT NULL,
        account_id BIGINT NOT NULL REFERENCES accounts_tb (account_id),
        amount     NUMERIC(30, 0) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (reference, leg)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS otp_challenges_tb (
        challenge_id UUID PRIMARY KEY,
        user_id      BIGINT NOT NULL,
        purpose      SMALLINT NOT NULL,
        reference    VARCHAR(64),
        code_hash    TEXT NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        expires_at   TIMESTAMPTZ NOT NULL,
        consumed     BOOLEAN NOT NULL DEFAULT FALSE,
        attempts     SMALLINT NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_otp_lookup ON otp_challenges_tb (user_id, purpose, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS transactions_tb (
        reference         VARCHAR(26) PRIMARY KEY,
        kind              SMALLINT NOT NULL,
        source_account_id BIGINT,
        dest_account_id   BIGINT,
        dest_external     SMALLINT,
        dest_service      VARCHAR(32),
        dest_provider     VARCHAR(64),
        dest_identifier   VARCHAR(64),
        amount            NUMERIC(30, 0) NOT NULL,
        fee               NUMERIC(30, 0) NOT NULL,
        total             NUMERIC(30, 0) NOT NULL,
        currency          VARCHAR(3) NOT NULL,
        description       VARCHAR(200) NOT NULL,
        initiator_id      BIGINT NOT NULL,
        officer_id        BIGINT,
        status            SMALLINT NOT NULL,
        otp_verified      BOOLEAN NOT NULL DEFAULT FALSE,
        failure_reason    TEXT,
        external_ref      VARCHAR(64),
        created_at        TIMESTAMPTZ NOT NULL,
        updated_at        TIMESTAMPTZ NOT NULL,
        processed_at      TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_initiator ON transactions_tb (initiator_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions_tb (status, updated_at)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_source ON transactions_tb (source_account_id)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_dest ON transactions_tb (dest_account_id)",
];

/// Create all tables and indexes
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = STATEMENTS.len(), "Database schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        for statement in STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "not idempotent: {}",
                statement
            );
        }
    }
}

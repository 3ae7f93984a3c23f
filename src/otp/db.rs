//! PostgreSQL challenge store
//!
//! Liveness conditions are part of every mutating `WHERE` clause, so the
//! database row is the arbiter under concurrency.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use super::error::OtpError;
use super::store::OtpStore;
use super::types::{ChallengeId, OtpChallenge, OtpPurpose};
use crate::core_types::{TimestampMs, UserId};
use crate::db::SafeRow;
use crate::time::to_datetime;

const COLUMNS: &str =
    "challenge_id, user_id, purpose, reference, code_hash, created_at, expires_at, consumed, attempts";

pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_challenge(row: &PgRow) -> Result<OtpChallenge, OtpError> {
    let purpose_id: i16 = row.try_get_log("purpose")?;
    let purpose = OtpPurpose::from_id(purpose_id)
        .ok_or_else(|| OtpError::Storage(format!("Invalid purpose: {}", purpose_id)))?;
    let created_at: chrono::DateTime<chrono::Utc> = row.try_get_log("created_at")?;
    let expires_at: chrono::DateTime<chrono::Utc> = row.try_get_log("expires_at")?;

    Ok(OtpChallenge {
        id: ChallengeId::from_uuid(row.try_get_log::<Uuid>("challenge_id")?),
        user_id: row.try_get_log::<i64>("user_id")? as UserId,
        purpose,
        reference: row.try_get_log("reference")?,
        code_hash: row.try_get_log("code_hash")?,
        created_at: created_at.timestamp_millis(),
        expires_at: expires_at.timestamp_millis(),
        consumed: row.try_get_log("consumed")?,
        attempts: row.try_get_log::<i16>("attempts")?.clamp(0, u8::MAX as i16) as u8,
    })
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError> {
        sqlx::query(
            r#"
            INSERT INTO otp_challenges_tb
                (challenge_id, user_id, purpose, reference, code_hash, created_at, expires_at, consumed, attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(challenge.id.as_uuid())
        .bind(challenge.user_id as i64)
        .bind(challenge.purpose.id())
        .bind(&challenge.reference)
        .bind(&challenge.code_hash)
        .bind(to_datetime(challenge.created_at))
        .bind(to_datetime(challenge.expires_at))
        .bind(challenge.consumed)
        .bind(challenge.attempts as i16)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_active(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<Option<OtpChallenge>, OtpError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM otp_challenges_tb \
             WHERE user_id = $1 AND purpose = $2 AND ($3::TEXT IS NULL OR reference = $3) \
               AND NOT consumed AND expires_at > $4 AND attempts < $5 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id as i64)
            .bind(purpose.id())
            .bind(reference)
            .bind(to_datetime(now))
            .bind(max_attempts as i16)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_challenge).transpose()
    }

    async fn find_latest(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
    ) -> Result<Option<OtpChallenge>, OtpError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM otp_challenges_tb \
             WHERE user_id = $1 AND purpose = $2 AND ($3::TEXT IS NULL OR reference = $3) \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(user_id as i64)
            .bind(purpose.id())
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_challenge).transpose()
    }

    async fn record_failed_attempt(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<Option<u8>, OtpError> {
        let attempts: Option<i16> = sqlx::query_scalar(
            r#"
            UPDATE otp_challenges_tb SET attempts = attempts + 1
            WHERE challenge_id = $1 AND NOT consumed AND expires_at > $2 AND attempts < $3
            RETURNING attempts
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_datetime(now))
        .bind(max_attempts as i16)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempts.map(|a| a as u8))
    }

    async fn consume(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<bool, OtpError> {
        let result = sqlx::query(
            r#"
            UPDATE otp_challenges_tb SET consumed = TRUE
            WHERE challenge_id = $1 AND NOT consumed AND expires_at > $2 AND attempts < $3
            "#,
        )
        .bind(id.as_uuid())
        .bind(to_datetime(now))
        .bind(max_attempts as i16)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge(&self, now: TimestampMs, max_attempts: u8) -> Result<usize, OtpError> {
        let result = sqlx::query(
            "DELETE FROM otp_challenges_tb WHERE consumed OR expires_at <= $1 OR attempts >= $2",
        )
        .bind(to_datetime(now))
        .bind(max_attempts as i16)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }
}

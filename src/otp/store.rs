//! Challenge storage
//!
//! Attempt accounting and consumption are conditional updates: they only
//! apply while the challenge is still live, so two concurrent correct
//! submissions consume a challenge exactly once and an exhausted challenge's
//! counter never moves again.

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::OtpError;
use super::types::{ChallengeId, OtpChallenge, OtpPurpose};
use crate::core_types::{TimestampMs, UserId};

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError>;

    /// Newest live challenge matching the key
    async fn find_active(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<Option<OtpChallenge>, OtpError>;

    /// Newest challenge matching the key, in any state
    async fn find_latest(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
    ) -> Result<Option<OtpChallenge>, OtpError>;

    /// Increment the attempt counter if the challenge is still live.
    ///
    /// Returns the new counter, or `None` if the challenge was no longer live.
    async fn record_failed_attempt(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<Option<u8>, OtpError>;

    /// Mark consumed if still live. `false` means another caller got there first.
    async fn consume(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<bool, OtpError>;

    /// Delete expired, consumed and exhausted challenges
    async fn purge(&self, now: TimestampMs, max_attempts: u8) -> Result<usize, OtpError>;
}

/// DashMap-backed store for development and tests
#[derive(Default)]
pub struct InMemoryOtpStore {
    challenges: DashMap<ChallengeId, OtpChallenge>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    pub fn get(&self, id: ChallengeId) -> Option<OtpChallenge> {
        self.challenges.get(&id).map(|c| c.value().clone())
    }

    fn newest<F>(&self, filter: F) -> Option<OtpChallenge>
    where
        F: Fn(&OtpChallenge) -> bool,
    {
        self.challenges
            .iter()
            .filter(|entry| filter(entry.value()))
            .max_by_key(|entry| entry.value().created_at)
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn insert(&self, challenge: OtpChallenge) -> Result<(), OtpError> {
        self.challenges.insert(challenge.id, challenge);
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
        Ok(self.newest(|c| {
            c.matches(user_id, purpose, reference) && c.is_live(now, max_attempts)
        }))
    }

    async fn find_latest(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
    ) -> Result<Option<OtpChallenge>, OtpError> {
        Ok(self.newest(|c| c.matches(user_id, purpose, reference)))
    }

    async fn record_failed_attempt(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<Option<u8>, OtpError> {
        let Some(mut challenge) = self.challenges.get_mut(&id) else {
            return Ok(None);
        };
        if !challenge.is_live(now, max_attempts) {
            return Ok(None);
        }
        challenge.attempts += 1;
        Ok(Some(challenge.attempts))
    }

    async fn consume(
        &self,
        id: ChallengeId,
        now: TimestampMs,
        max_attempts: u8,
    ) -> Result<bool, OtpError> {
        let Some(mut challenge) = self.challenges.get_mut(&id) else {
            return Ok(false);
        };
        if !challenge.is_live(now, max_attempts) {
            return Ok(false);
        }
        challenge.consumed = true;
        Ok(true)
    }

    async fn purge(&self, now: TimestampMs, max_attempts: u8) -> Result<usize, OtpError> {
        let before = self.challenges.len();
        self.challenges
            .retain(|_, challenge| challenge.is_live(now, max_attempts));
        Ok(before.saturating_sub(self.challenges.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(user_id: UserId, reference: &str, created_at: TimestampMs) -> OtpChallenge {
        OtpChallenge {
            id: ChallengeId::new(),
            user_id,
            purpose: OtpPurpose::Transaction,
            reference: Some(reference.to_string()),
            code_hash: String::new(),
            created_at,
            expires_at: created_at + 300_000,
            consumed: false,
            attempts: 0,
        }
    }

    #[tokio::test]
    async fn test_find_active_returns_newest() {
        let store = InMemoryOtpStore::new();
        let old = challenge(1, "A", 1_000);
        let new = challenge(1, "A", 2_000);
        store.insert(old).await.unwrap();
        store.insert(new.clone()).await.unwrap();

        let found = store
            .find_active(1, OtpPurpose::Transaction, Some("A"), 2_500, 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, new.id);
    }

    #[tokio::test]
    async fn test_failed_attempts_stop_at_cap() {
        let store = InMemoryOtpStore::new();
        let c = challenge(1, "A", 0);
        let id = c.id;
        store.insert(c).await.unwrap();

        assert_eq!(store.record_failed_attempt(id, 1, 3).await.unwrap(), Some(1));
        assert_eq!(store.record_failed_attempt(id, 1, 3).await.unwrap(), Some(2));
        assert_eq!(store.record_failed_attempt(id, 1, 3).await.unwrap(), Some(3));
        assert_eq!(store.record_failed_attempt(id, 1, 3).await.unwrap(), None);
        assert_eq!(store.get(id).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_consume_once() {
        let store = InMemoryOtpStore::new();
        let c = challenge(1, "A", 0);
        let id = c.id;
        store.insert(c).await.unwrap();

        assert!(store.consume(id, 1, 3).await.unwrap());
        assert!(!store.consume(id, 1, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_rejects_expired() {
        let store = InMemoryOtpStore::new();
        let c = challenge(1, "A", 0);
        let id = c.id;
        store.insert(c).await.unwrap();
        assert!(!store.consume(id, 300_000, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_removes_dead_challenges() {
        let store = InMemoryOtpStore::new();
        let live = challenge(1, "live", 100_000);
        let expired = challenge(1, "expired", 0);
        let mut consumed = challenge(1, "consumed", 100_000);
        consumed.consumed = true;
        let mut exhausted = challenge(1, "exhausted", 100_000);
        exhausted.attempts = 3;
        let live_id = live.id;
        for c in [live, expired, consumed, exhausted] {
            store.insert(c).await.unwrap();
        }

        assert_eq!(store.purge(350_000, 3).await.unwrap(), 3);
        assert_eq!(store.len(), 1);
        assert!(store.get(live_id).is_some());
    }
}

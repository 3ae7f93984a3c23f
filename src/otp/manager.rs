//! Challenge Manager
//!
//! Issues and verifies one-time codes bound to (user, purpose, reference).

use std::sync::Arc;

use rand::Rng;
use rand::rngs::OsRng;

use super::OtpConfig;
use super::error::OtpError;
use super::hasher::CodeHasher;
use super::notifier::{CodeDelivery, Notifier};
use super::store::OtpStore;
use super::types::{ChallengeId, IssuedChallenge, OtpChallenge, OtpPurpose};
use crate::core_types::UserId;
use crate::time::TimeSource;

pub struct ChallengeManager {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn TimeSource>,
    hasher: CodeHasher,
    config: OtpConfig,
}

impl ChallengeManager {
    pub fn new(
        store: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn TimeSource>,
        config: OtpConfig,
    ) -> Result<Self, OtpError> {
        let hasher = CodeHasher::new(config.hash)?;
        if config.expose_codes && !cfg!(feature = "dev-otp") {
            tracing::warn!("otp.expose_codes is set but the dev-otp feature is disabled; codes stay hidden");
        }
        Ok(Self {
            store,
            notifier,
            clock,
            hasher,
            config,
        })
    }

    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    fn generate_code(&self) -> String {
        let mut rng = OsRng;
        (0..self.config.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }

    fn is_well_formed(&self, code: &str) -> bool {
        code.len() == self.config.code_length as usize && code.bytes().all(|b| b.is_ascii_digit())
    }

    /// Issue a fresh challenge and hand the plaintext to the notifier.
    ///
    /// A delivery failure does not fail issuance; it is reported through
    /// `delivered = false` so the caller can offer a resend.
    pub async fn issue(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
    ) -> Result<IssuedChallenge, OtpError> {
        let code = self.generate_code();
        let code_hash = self.hasher.hash(code.clone()).await?;
        let now = self.clock.now_ms();
        let expires_at = now + self.config.ttl_secs as i64 * 1_000;

        let challenge = OtpChallenge {
            id: ChallengeId::new(),
            user_id,
            purpose,
            reference: reference.map(str::to_string),
            code_hash,
            created_at: now,
            expires_at,
            consumed: false,
            attempts: 0,
        };
        let challenge_id = challenge.id;
        self.store.insert(challenge).await?;

        let delivery = CodeDelivery {
            user_id,
            purpose,
            reference: reference.map(str::to_string),
            code: code.clone(),
            expires_at,
        };
        let delivered = match self.notifier.deliver(&delivery).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    challenge_id = %challenge_id,
                    notifier = self.notifier.name(),
                    error = %e,
                    "Verification code delivery failed"
                );
                false
            }
        };

        tracing::info!(
            challenge_id = %challenge_id,
            user_id,
            purpose = %purpose,
            reference = ?reference,
            delivered,
            "Challenge issued"
        );

        let expose = self.config.expose_codes && cfg!(feature = "dev-otp");
        Ok(IssuedChallenge {
            challenge_id,
            expires_at,
            delivered,
            dev_code: expose.then_some(code),
        })
    }

    /// Verify a submitted code against the newest live challenge.
    ///
    /// A mismatch spends one attempt; `InvalidCode { attempts_remaining: 0 }`
    /// means the challenge is now exhausted. Once exhausted, consumed or
    /// expired a challenge is invisible and its counter is never touched again.
    pub async fn verify(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
        code: &str,
    ) -> Result<(), OtpError> {
        let now = self.clock.now_ms();
        let max = self.config.max_attempts;
        let code = code.trim();

        let Some(challenge) = self
            .store
            .find_active(user_id, purpose, reference, now, max)
            .await?
        else {
            return Err(self.explain_missing(user_id, purpose, reference, now).await?);
        };

        let matched = self.is_well_formed(code)
            && self
                .hasher
                .verify(code.to_string(), challenge.code_hash.clone())
                .await?;

        if matched {
            if self.store.consume(challenge.id, now, max).await? {
                tracing::info!(challenge_id = %challenge.id, user_id, "Challenge verified");
                return Ok(());
            }
            // Lost the race to a concurrent submission
            return Err(OtpError::ChallengeNotFound);
        }

        match self
            .store
            .record_failed_attempt(challenge.id, now, max)
            .await?
        {
            Some(attempts) => {
                let attempts_remaining = max.saturating_sub(attempts);
                tracing::warn!(
                    challenge_id = %challenge.id,
                    user_id,
                    attempts_remaining,
                    "Invalid verification code"
                );
                Err(OtpError::InvalidCode { attempts_remaining })
            }
            None => Err(OtpError::ChallengeNotFound),
        }
    }

    async fn explain_missing(
        &self,
        user_id: UserId,
        purpose: OtpPurpose,
        reference: Option<&str>,
        now: i64,
    ) -> Result<OtpError, OtpError> {
        let latest = self.store.find_latest(user_id, purpose, reference).await?;
        Ok(match latest {
            Some(c) if !c.consumed && c.attempts < self.config.max_attempts && c.is_expired(now) => {
                OtpError::ChallengeExpired
            }
            _ => OtpError::ChallengeNotFound,
        })
    }

    /// Garbage-collect expired, consumed and exhausted challenges
    pub async fn purge_dead(&self) -> Result<usize, OtpError> {
        let purged = self
            .store
            .purge(self.clock.now_ms(), self.config.max_attempts)
            .await?;
        if purged > 0 {
            tracing::debug!(purged, "Purged dead challenges");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::otp::hasher::HashParams;
    use crate::otp::notifier::MemoryNotifier;
    use crate::otp::store::InMemoryOtpStore;
    use crate::time::ManualTimeSource;

    struct Fixture {
        manager: Arc<ChallengeManager>,
        notifier: Arc<MemoryNotifier>,
        store: Arc<InMemoryOtpStore>,
        clock: Arc<ManualTimeSource>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOtpStore::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
        let config = OtpConfig {
            hash: HashParams {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
            },
            ..OtpConfig::default()
        };
        let manager = Arc::new(
            ChallengeManager::new(store.clone(), notifier.clone(), clock.clone(), config).unwrap(),
        );
        Fixture {
            manager,
            notifier,
            store,
            clock,
        }
    }

    fn wrong(code: &str) -> String {
        let first = if code.starts_with('0') { '1' } else { '0' };
        format!("{}{}", first, &code[1..])
    }

    #[tokio::test]
    async fn test_issue_delivers_six_digit_code() {
        let f = fixture();
        let issued = f
            .manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        assert!(issued.delivered);
        assert!(issued.dev_code.is_none());
        assert_eq!(issued.expires_at, f.clock.now_ms() + 300_000);

        let code = f.notifier.last_code_for(7).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));

        let stored = f.store.get(issued.challenge_id).unwrap();
        assert_ne!(stored.code_hash, code);
    }

    #[tokio::test]
    async fn test_verify_once() {
        let f = fixture();
        f.manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        let code = f.notifier.last_code_for(7).unwrap();

        f.manager
            .verify(7, OtpPurpose::Transaction, Some("R1"), &format!(" {} ", code))
            .await
            .unwrap();
        assert_eq!(
            f.manager
                .verify(7, OtpPurpose::Transaction, Some("R1"), &code)
                .await,
            Err(OtpError::ChallengeNotFound)
        );
    }

    #[tokio::test]
    async fn test_verify_binds_user_purpose_reference() {
        let f = fixture();
        f.manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        let code = f.notifier.last_code_for(7).unwrap();

        for (user, purpose, reference) in [
            (8, OtpPurpose::Transaction, Some("R1")),
            (7, OtpPurpose::Utility, Some("R1")),
            (7, OtpPurpose::Transaction, Some("R2")),
        ] {
            assert_eq!(
                f.manager.verify(user, purpose, reference, &code).await,
                Err(OtpError::ChallengeNotFound)
            );
        }
    }

    #[tokio::test]
    async fn test_three_failures_exhaust_and_fourth_does_not_mutate() {
        let f = fixture();
        let issued = f
            .manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        let bad = wrong(&f.notifier.last_code_for(7).unwrap());

        for remaining in [2u8, 1, 0] {
            assert_eq!(
                f.manager
                    .verify(7, OtpPurpose::Transaction, Some("R1"), &bad)
                    .await,
                Err(OtpError::InvalidCode {
                    attempts_remaining: remaining
                })
            );
        }
        assert_eq!(
            f.manager
                .verify(7, OtpPurpose::Transaction, Some("R1"), &bad)
                .await,
            Err(OtpError::ChallengeNotFound)
        );
        assert_eq!(f.store.get(issued.challenge_id).unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_malformed_code_counts_as_attempt() {
        let f = fixture();
        f.manager
            .issue(7, OtpPurpose::Login, None)
            .await
            .unwrap();
        assert_eq!(
            f.manager.verify(7, OtpPurpose::Login, None, "12ab").await,
            Err(OtpError::InvalidCode {
                attempts_remaining: 2
            })
        );
    }

    #[tokio::test]
    async fn test_expired_challenge_never_verifies() {
        let f = fixture();
        f.manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        let code = f.notifier.last_code_for(7).unwrap();

        f.clock.advance(Duration::from_secs(300));
        assert_eq!(
            f.manager
                .verify(7, OtpPurpose::Transaction, Some("R1"), &code)
                .await,
            Err(OtpError::ChallengeExpired)
        );
    }

    #[tokio::test]
    async fn test_newest_challenge_wins() {
        let f = fixture();
        f.manager.issue(7, OtpPurpose::Login, None).await.unwrap();
        let first = f.notifier.last_code_for(7).unwrap();
        f.clock.advance(Duration::from_secs(1));
        f.manager.issue(7, OtpPurpose::Login, None).await.unwrap();
        let second = f.notifier.last_code_for(7).unwrap();

        if first != second {
            assert!(f.manager.verify(7, OtpPurpose::Login, None, &first).await.is_err());
        }
        f.manager
            .verify(7, OtpPurpose::Login, None, &second)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_correct_submissions_consume_once() {
        let f = fixture();
        f.manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        let code = f.notifier.last_code_for(7).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&f.manager);
            let code = code.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .verify(7, OtpPurpose::Transaction, Some("R1"), &code)
                    .await
                    .is_ok()
            }));
        }
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_issues() {
        let f = fixture();
        f.notifier.set_fail(true);
        let issued = f
            .manager
            .issue(7, OtpPurpose::Transaction, Some("R1"))
            .await
            .unwrap();
        assert!(!issued.delivered);
        assert!(f.store.get(issued.challenge_id).is_some());
    }

    #[tokio::test]
    async fn test_purge_dead() {
        let f = fixture();
        f.manager.issue(7, OtpPurpose::Login, None).await.unwrap();
        f.clock.advance(Duration::from_secs(10));
        f.manager.issue(8, OtpPurpose::Login, None).await.unwrap();
        f.clock.advance(Duration::from_secs(295));

        assert_eq!(f.manager.purge_dead().await.unwrap(), 1);
        assert_eq!(f.store.len(), 1);
    }
}

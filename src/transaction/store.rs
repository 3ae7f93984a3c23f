//! Transaction storage
//!
//! Every status change is a compare-and-set on the expected current status,
//! so concurrent verifications and the recovery worker never both win.

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::TransactionError;
use super::state::TransactionStatus;
use super::types::{HistoryFilter, TransactionRecord};
use crate::core_types::{AccountId, TimestampMs, TransactionRef, UserId};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, record: &TransactionRecord) -> Result<(), TransactionError>;

    async fn get(
        &self,
        reference: TransactionRef,
    ) -> Result<Option<TransactionRecord>, TransactionError>;

    /// CAS: `expected -> next`. Returns `false` if the status had moved on.
    async fn update_status_if(
        &self,
        reference: TransactionRef,
        expected: TransactionStatus,
        next: TransactionStatus,
        now: TimestampMs,
    ) -> Result<bool, TransactionError>;

    /// Record a successful code check while still PENDING
    async fn mark_otp_verified(
        &self,
        reference: TransactionRef,
        now: TimestampMs,
    ) -> Result<bool, TransactionError>;

    /// CAS: `expected -> FAILED` with a reason
    async fn fail_if(
        &self,
        reference: TransactionRef,
        expected: TransactionStatus,
        reason: &str,
        now: TimestampMs,
    ) -> Result<bool, TransactionError>;

    /// CAS: `PROCESSING -> COMPLETED`, stamping `processed_at`
    async fn complete_if(
        &self,
        reference: TransactionRef,
        external_ref: Option<&str>,
        now: TimestampMs,
    ) -> Result<bool, TransactionError>;

    /// Records in `status` not updated since `cutoff`, oldest first
    async fn find_in_status_before(
        &self,
        status: TransactionStatus,
        cutoff: TimestampMs,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, TransactionError>;

    /// Records initiated by `user` or touching any of `accounts`, newest first
    async fn list_for(
        &self,
        user: UserId,
        accounts: &[AccountId],
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionRecord>, TransactionError>;
}

/// DashMap-backed store for development and tests
#[derive(Default)]
pub struct InMemoryTransactionStore {
    records: DashMap<TransactionRef, TransactionRecord>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn cas<F>(
        &self,
        reference: TransactionRef,
        expected: TransactionStatus,
        apply: F,
    ) -> bool
    where
        F: FnOnce(&mut TransactionRecord),
    {
        let Some(mut record) = self.records.get_mut(&reference) else {
            return false;
        };
        if record.status != expected {
            return false;
        }
        apply(&mut record);
        true
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, record: &TransactionRecord) -> Result<(), TransactionError> {
        if self.records.contains_key(&record.reference) {
            return Err(TransactionError::Storage(format!(
                "duplicate reference {}",
                record.reference
            )));
        }
        self.records.insert(record.reference, record.clone());
        Ok(())
    }

    async fn get(
        &self,
        reference: TransactionRef,
    ) -> Result<Option<TransactionRecord>, TransactionError> {
        Ok(self.records.get(&reference).map(|r| r.value().clone()))
    }

    async fn update_status_if(
        &self,
        reference: TransactionRef,
        expected: TransactionStatus,
        next: TransactionStatus,
        now: TimestampMs,
    ) -> Result<bool, TransactionError> {
        debug_assert!(expected.can_transition_to(next), "{} -> {}", expected, next);
        Ok(self.cas(reference, expected, |record| {
            record.status = next;
            record.updated_at = now;
        }))
    }

    async fn mark_otp_verified(
        &self,
        reference: TransactionRef,
        now: TimestampMs,
    ) -> Result<bool, TransactionError> {
        Ok(self.cas(reference, TransactionStatus::Pending, |record| {
            record.otp_verified = true;
            record.updated_at = now;
        }))
    }

    async fn fail_if(
        &self,
        reference: TransactionRef,
        expected: TransactionStatus,
        reason: &str,
        now: TimestampMs,
    ) -> Result<bool, TransactionError> {
        debug_assert!(expected.can_transition_to(TransactionStatus::Failed));
        Ok(self.cas(reference, expected, |record| {
            record.status = TransactionStatus::Failed;
            record.failure_reason = Some(reason.to_string());
            record.updated_at = now;
        }))
    }

    async fn complete_if(
        &self,
        reference: TransactionRef,
        external_ref: Option<&str>,
        now: TimestampMs,
    ) -> Result<bool, TransactionError> {
        Ok(self.cas(reference, TransactionStatus::Processing, |record| {
            record.status = TransactionStatus::Completed;
            record.external_ref = external_ref.map(str::to_string);
            record.processed_at = Some(now);
            record.updated_at = now;
        }))
    }

    async fn find_in_status_before(
        &self,
        status: TransactionStatus,
        cutoff: TimestampMs,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, TransactionError> {
        let mut found: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|r| r.status == status && r.updated_at < cutoff)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by_key(|r| r.updated_at);
        found.truncate(limit);
        Ok(found)
    }

    async fn list_for(
        &self,
        user: UserId,
        accounts: &[AccountId],
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionRecord>, TransactionError> {
        let mut found: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.initiator == user || accounts.iter().any(|id| r.touches_account(*id))
            })
            .filter(|r| filter.matches(r))
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.reference.cmp(&a.reference))
        });
        Ok(found
            .into_iter()
            .skip(filter.clamped_offset())
            .take(filter.clamped_limit())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::transaction::types::{Authorization, Destination, TransactionKind};

    fn record(initiator: UserId, source: AccountId, dest: AccountId, at: TimestampMs) -> TransactionRecord {
        TransactionRecord {
            reference: TransactionRef::new(),
            kind: TransactionKind::Transfer,
            source_account_id: Some(source),
            destination: Destination::InternalAccount(dest),
            amount: 100_000,
            fee: 0,
            total: 100_000,
            currency: Currency::Vnd,
            description: "Fund transfer".into(),
            initiator,
            authorization: Authorization::Otp,
            status: TransactionStatus::Pending,
            otp_verified: false,
            failure_reason: None,
            external_ref: None,
            created_at: at,
            updated_at: at,
            processed_at: None,
        }
    }

    #[tokio::test]
    async fn test_cas_only_one_winner() {
        let store = InMemoryTransactionStore::new();
        let r = record(1, 10, 20, 1_000);
        store.create(&r).await.unwrap();

        assert!(
            store
                .update_status_if(r.reference, TransactionStatus::Pending, TransactionStatus::Processing, 2_000)
                .await
                .unwrap()
        );
        assert!(
            !store
                .update_status_if(r.reference, TransactionStatus::Pending, TransactionStatus::Processing, 2_000)
                .await
                .unwrap()
        );
        assert!(!store.mark_otp_verified(r.reference, 2_000).await.unwrap());

        assert!(store.complete_if(r.reference, Some("REFX"), 3_000).await.unwrap());
        let done = store.get(r.reference).await.unwrap().unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert_eq!(done.processed_at, Some(3_000));
        assert_eq!(done.external_ref.as_deref(), Some("REFX"));

        assert!(
            !store
                .fail_if(r.reference, TransactionStatus::Processing, "late", 4_000)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemoryTransactionStore::new();
        let r = record(1, 10, 20, 1_000);
        store.create(&r).await.unwrap();
        assert!(store.create(&r).await.is_err());
    }

    #[tokio::test]
    async fn test_find_in_status_before() {
        let store = InMemoryTransactionStore::new();
        let old = record(1, 10, 20, 1_000);
        let fresh = record(1, 10, 20, 9_000);
        store.create(&old).await.unwrap();
        store.create(&fresh).await.unwrap();

        let stale = store
            .find_in_status_before(TransactionStatus::Pending, 5_000, 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].reference, old.reference);
    }

    #[tokio::test]
    async fn test_list_for_participants_newest_first() {
        let store = InMemoryTransactionStore::new();
        let sent = record(1, 10, 20, 1_000);
        let received = record(2, 30, 11, 2_000);
        let unrelated = record(3, 40, 50, 3_000);
        for r in [&sent, &received, &unrelated] {
            store.create(r).await.unwrap();
        }

        let history = store
            .list_for(1, &[10, 11], &HistoryFilter::default())
            .await
            .unwrap();
        let refs: Vec<_> = history.iter().map(|r| r.reference).collect();
        assert_eq!(refs, vec![received.reference, sent.reference]);

        let page = store
            .list_for(1, &[10, 11], &HistoryFilter { limit: 1, offset: 1, ..HistoryFilter::default() })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].reference, sent.reference);
    }
}

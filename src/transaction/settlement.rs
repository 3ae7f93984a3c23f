//! Settlement saga
//!
//! A PROCESSING record is the intent. Legs are posted in a fixed order,
//! each under its own idempotency key:
//!
//! 1. DEBIT  source `total` (absent for deposits)
//! 2. CREDIT destination `amount` (internal destinations only)
//! 3. FEE    fee sink `fee` (when a sink is configured)
//!
//! A definitive rejection of the credit is compensated by a REFUND leg
//! back to the source. Reconciliation only fails an undebited record after
//! voiding its postings, so a settlement still in flight cannot debit it
//! afterwards. An ambiguous (storage) failure is never compensated
//! blindly: the posting journal decides, and [`Settlement::reconcile`] rolls
//! forward from whatever it finds.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::error::TransactionError;
use super::state::TransactionStatus;
use super::store::TransactionStore;
use super::types::{FailureReason, TransactionKind, TransactionRecord};
use crate::core_types::AccountId;
use crate::ledger::{Leg, Ledger, LedgerError, Posting, PostingKey};
use crate::time::TimeSource;

pub struct Settlement {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TransactionStore>,
    clock: Arc<dyn TimeSource>,
    fee_sink: Option<AccountId>,
}

/// Settlement reference handed to utility providers.
///
/// Derived from the transaction reference so replays produce the same value.
pub fn external_ref_for(record: &TransactionRecord) -> Option<String> {
    (record.kind == TransactionKind::Payment).then(|| format!("REF{}", record.reference))
}

fn has_leg(postings: &[Posting], leg: Leg) -> bool {
    postings.iter().any(|p| p.leg == leg)
}

impl Settlement {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TransactionStore>,
        clock: Arc<dyn TimeSource>,
        fee_sink: Option<AccountId>,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
            fee_sink,
        }
    }

    pub fn fee_sink(&self) -> Option<AccountId> {
        self.fee_sink
    }

    /// Drive a freshly PROCESSING record to a terminal state.
    ///
    /// `Ok` carries the COMPLETED record. On `Err` the record is FAILED,
    /// or still PROCESSING if the ledger outcome was ambiguous.
    pub async fn settle(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionRecord, TransactionError> {
        let source = record.source_account_id;
        let destination = record.destination.internal_account();

        // Binding solvency check against fresh balances
        if let Some(src) = source
            && !self.ledger.can_debit(src, record.total).await?
        {
            self.fail(record, FailureReason::InsufficientFunds).await?;
            return Err(TransactionError::InsufficientFunds);
        }
        if let Some(dest) = destination {
            let usable = self.ledger.get(dest).await?.is_some_and(|a| a.is_active);
            if !usable {
                self.fail(
                    record,
                    FailureReason::Execution("destination account unavailable".into()),
                )
                .await?;
                return Err(TransactionError::DestinationAccountUnavailable);
            }
        }

        if let Some(src) = source {
            match self
                .ledger
                .debit(src, record.total, &PostingKey::new(record.reference, Leg::Debit))
                .await
            {
                Ok(_) => {}
                Err(LedgerError::Closed(_)) => return Err(self.superseded(record).await),
                Err(LedgerError::InsufficientFunds { .. }) => {
                    self.fail(record, FailureReason::InsufficientFunds).await?;
                    return Err(TransactionError::InsufficientFunds);
                }
                Err(e) if e.is_rejection() => {
                    self.fail(record, FailureReason::Execution(e.to_string()))
                        .await?;
                    return Err(TransactionError::Execution(e.to_string()));
                }
                Err(e) => return self.after_ambiguous(record, e).await,
            }
        }

        if let Some(dest) = destination {
            match self
                .ledger
                .credit(dest, record.amount, &PostingKey::new(record.reference, Leg::Credit))
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_rejection() => return Err(self.compensate(record, e).await),
                Err(e) => return self.after_ambiguous(record, e).await,
            }
        }

        self.finish(record).await
    }

    /// Resolve a PROCESSING record from the posting journal.
    ///
    /// Returns the resulting status; PROCESSING means another pass is needed.
    pub async fn reconcile(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionStatus, TransactionError> {
        if record.status != TransactionStatus::Processing {
            return Ok(record.status);
        }

        let mut postings = self.ledger.postings(record.reference).await?;

        if has_leg(&postings, Leg::Refund) {
            self.fail(
                record,
                FailureReason::Execution("credit rejected; source refunded".into()),
            )
            .await?;
            return Ok(TransactionStatus::Failed);
        }

        if let Some(src) = record.source_account_id
            && !has_leg(&postings, Leg::Debit)
        {
            if self.ledger.void(record.reference, src).await? {
                self.fail(record, FailureReason::Interrupted).await?;
                return Ok(TransactionStatus::Failed);
            }
            // Debited after the journal was read
            postings = self.ledger.postings(record.reference).await?;
        }

        if let Some(dest) = record.destination.internal_account()
            && !has_leg(&postings, Leg::Credit)
        {
            match self
                .ledger
                .credit(dest, record.amount, &PostingKey::new(record.reference, Leg::Credit))
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_rejection() => {
                    self.compensate(record, e).await;
                    return Ok(self.current_status(record).await?);
                }
                Err(e) => {
                    warn!(reference = %record.reference, error = %e, "Credit still failing, will retry");
                    return Ok(TransactionStatus::Processing);
                }
            }
        }

        Ok(self.finish(record).await?.status)
    }

    async fn finish(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionRecord, TransactionError> {
        self.post_fee(record).await;

        let external_ref = external_ref_for(record);
        let now = self.clock.now_ms();
        if self
            .store
            .complete_if(record.reference, external_ref.as_deref(), now)
            .await?
        {
            info!(
                reference = %record.reference,
                kind = %record.kind,
                amount = record.amount,
                fee = record.fee,
                "Transaction completed"
            );
        }

        let current = self.reload(record).await?;
        if current.status != TransactionStatus::Completed {
            error!(
                reference = %record.reference,
                status = %current.status,
                "Legs posted but record could not be completed"
            );
            return Err(TransactionError::Execution(format!(
                "transaction is {}, not completed",
                current.status
            )));
        }
        Ok(current)
    }

    /// Reconciliation closed this reference while the settlement was in flight
    async fn superseded(&self, record: &TransactionRecord) -> TransactionError {
        warn!(reference = %record.reference, "Settlement superseded by reconciliation");
        match self.reload(record).await {
            Ok(current) => TransactionError::Execution(
                current
                    .failure_reason
                    .unwrap_or_else(|| FailureReason::Interrupted.to_string()),
            ),
            Err(e) => e,
        }
    }

    async fn post_fee(&self, record: &TransactionRecord) {
        let Some(sink) = self.fee_sink else { return };
        if record.fee == 0 {
            return;
        }
        if let Err(e) = self
            .ledger
            .credit(sink, record.fee, &PostingKey::new(record.reference, Leg::Fee))
            .await
        {
            warn!(
                reference = %record.reference,
                fee = record.fee,
                error = %e,
                "Fee posting failed"
            );
        }
    }

    /// Undo the debit after the destination definitively refused the credit.
    ///
    /// If the refund itself fails the record stays PROCESSING for the
    /// recovery worker.
    async fn compensate(&self, record: &TransactionRecord, cause: LedgerError) -> TransactionError {
        let Some(src) = record.source_account_id else {
            let reason = FailureReason::Execution(cause.to_string());
            if let Err(e) = self.fail(record, reason).await {
                warn!(reference = %record.reference, error = %e, "Failed to record failure");
            }
            return TransactionError::Execution(cause.to_string());
        };

        match self
            .ledger
            .credit(src, record.total, &PostingKey::new(record.reference, Leg::Refund))
            .await
        {
            Ok(_) => {
                let message = format!("{}; source refunded", cause);
                warn!(reference = %record.reference, cause = %cause, "Credit rejected, source refunded");
                if let Err(e) = self
                    .fail(record, FailureReason::Execution(message.clone()))
                    .await
                {
                    warn!(reference = %record.reference, error = %e, "Failed to record failure");
                }
                TransactionError::Execution(message)
            }
            Err(refund_err) => {
                error!(
                    reference = %record.reference,
                    source_account_id = src,
                    cause = %cause,
                    error = %refund_err,
                    "Refund failed, leaving PROCESSING for recovery"
                );
                TransactionError::Execution(format!("{}; refund pending", cause))
            }
        }
    }

    /// The ledger may or may not have applied a leg. Reconcile once now;
    /// if that cannot decide either, the recovery worker will.
    async fn after_ambiguous(
        &self,
        record: &TransactionRecord,
        cause: LedgerError,
    ) -> Result<TransactionRecord, TransactionError> {
        warn!(reference = %record.reference, error = %cause, "Ambiguous ledger outcome, reconciling");

        let status = match self.reconcile(record).await {
            Ok(status) => status,
            Err(e) => {
                warn!(reference = %record.reference, error = %e, "Immediate reconcile failed");
                TransactionStatus::Processing
            }
        };
        match status {
            TransactionStatus::Completed => self.reload(record).await,
            TransactionStatus::Failed => {
                let reloaded = self.reload(record).await?;
                Err(TransactionError::Execution(
                    reloaded.failure_reason.unwrap_or_else(|| cause.to_string()),
                ))
            }
            _ => Err(TransactionError::Storage(cause.to_string())),
        }
    }

    async fn fail(
        &self,
        record: &TransactionRecord,
        reason: FailureReason,
    ) -> Result<(), TransactionError> {
        let now = self.clock.now_ms();
        let applied = self
            .store
            .fail_if(
                record.reference,
                TransactionStatus::Processing,
                &reason.to_string(),
                now,
            )
            .await?;
        if applied {
            warn!(reference = %record.reference, reason = %reason, "Transaction failed");
        }
        Ok(())
    }

    async fn reload(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionRecord, TransactionError> {
        self.store
            .get(record.reference)
            .await?
            .ok_or(TransactionError::NotFound)
    }

    async fn current_status(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionStatus, TransactionError> {
        Ok(self.reload(record).await?.status)
    }
}

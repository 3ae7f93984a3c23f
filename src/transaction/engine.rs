//! Transaction Engine
//!
//! Two-phase flow for customer operations:
//!
//! ```text
//! initiate ──► PENDING (+ challenge issued, ledger untouched)
//! verify   ──► code check ──► [gate] ──► PROCESSING ──► settlement saga
//! ```
//!
//! Officer operations skip the challenge and settle in one call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::TransactionError;
use super::gate::{GateDecision, HighValueGate, STATUS_UNAVAILABLE};
use super::settlement::Settlement;
use super::state::TransactionStatus;
use super::store::TransactionStore;
use super::types::{
    Authorization, DepositRequest, Destination, ExternalService, FailureReason, HistoryFilter,
    InitiatedTransaction, OfficerAuthorization, OfficerTransferRequest, SettledTransaction,
    TransactionKind, TransactionRecord, TransferRequest, UpdatedBalances, UtilityPaymentRequest,
    WithdrawalRequest,
};
use crate::account::validation::{validate_description, validate_external_id};
use crate::account::{Account, AccountKind, AccountNumber};
use crate::core_types::{AccountId, Amount, TimestampMs, TransactionRef, UserId};
use crate::fee::{FeeSchedule, OperationKind};
use crate::ledger::Ledger;
use crate::otp::ChallengeManager;
use crate::time::TimeSource;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum principal for transfers and withdrawals
    pub min_amount: Amount,
    /// Principal at or above which the identity gate is consulted
    pub high_value_threshold: Amount,
    /// PENDING records older than this are expired by the sweep
    pub pending_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_amount: 10_000,
            high_value_threshold: 10_000_000,
            pending_ttl_secs: 900,
        }
    }
}

pub struct TransactionEngine {
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn TransactionStore>,
    otp: Arc<ChallengeManager>,
    gate: Arc<dyn HighValueGate>,
    clock: Arc<dyn TimeSource>,
    fees: FeeSchedule,
    config: EngineConfig,
    settlement: Settlement,
}

impl TransactionEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn TransactionStore>,
        otp: Arc<ChallengeManager>,
        gate: Arc<dyn HighValueGate>,
        clock: Arc<dyn TimeSource>,
        fees: FeeSchedule,
        config: EngineConfig,
    ) -> Self {
        let settlement = Settlement::new(ledger.clone(), store.clone(), clock.clone(), None);
        Self {
            ledger,
            store,
            otp,
            gate,
            clock,
            fees,
            config,
            settlement,
        }
    }

    /// Credit fees to `account_id` instead of extinguishing them
    pub fn with_fee_sink(mut self, account_id: AccountId) -> Self {
        self.settlement = Settlement::new(
            self.ledger.clone(),
            self.store.clone(),
            self.clock.clone(),
            Some(account_id),
        );
        self
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub fn otp(&self) -> &Arc<ChallengeManager> {
        &self.otp
    }

    pub fn clock(&self) -> &Arc<dyn TimeSource> {
        &self.clock
    }

    pub fn settlement(&self) -> &Settlement {
        &self.settlement
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    // ========================================================================
    // Customer operations
    // ========================================================================

    pub async fn initiate_transfer(
        &self,
        actor: UserId,
        req: TransferRequest,
    ) -> Result<InitiatedTransaction, TransactionError> {
        self.check_minimum(req.amount)?;
        let source = self.resolve_source(actor, req.source_account_id).await?;
        let destination = self
            .resolve_destination(&source, &req.destination_account_number)
            .await?;
        let (fee, total) = self.quote(req.amount, OperationKind::Transfer)?;
        Self::advisory_debit(&source, total)?;

        let description =
            validate_description(req.description.as_deref(), TransactionKind::Transfer.default_description())?;
        let record = self.new_record(
            TransactionKind::Transfer,
            Some(source.id),
            Destination::InternalAccount(destination.id),
            req.amount,
            fee,
            &source,
            description,
            actor,
            Authorization::Otp,
        );
        self.open_pending(record, Some(destination.masked_number()))
            .await
    }

    pub async fn verify_transfer(
        &self,
        actor: UserId,
        reference: TransactionRef,
        code: &str,
    ) -> Result<SettledTransaction, TransactionError> {
        self.verify_pending(actor, reference, code, TransactionKind::Transfer)
            .await
    }

    pub async fn initiate_utility_payment(
        &self,
        actor: UserId,
        req: UtilityPaymentRequest,
    ) -> Result<InitiatedTransaction, TransactionError> {
        Self::check_positive(req.amount)?;
        let provider = validate_external_id("provider_code", &req.provider_code)?;
        let identifier = validate_external_id("service_number", &req.service_number)?;
        let source = self.resolve_source(actor, req.account_id).await?;
        let (fee, total) = self.quote(req.amount, OperationKind::Utility(req.service))?;
        Self::advisory_debit(&source, total)?;

        let description =
            validate_description(req.description.as_deref(), TransactionKind::Payment.default_description())?;
        let record = self.new_record(
            TransactionKind::Payment,
            Some(source.id),
            Destination::ExternalReference {
                service: ExternalService::Utility(req.service),
                provider,
                identifier,
            },
            req.amount,
            fee,
            &source,
            description,
            actor,
            Authorization::Otp,
        );
        self.open_pending(record, None).await
    }

    pub async fn verify_utility_payment(
        &self,
        actor: UserId,
        reference: TransactionRef,
        code: &str,
    ) -> Result<SettledTransaction, TransactionError> {
        self.verify_pending(actor, reference, code, TransactionKind::Payment)
            .await
    }

    pub async fn initiate_withdrawal(
        &self,
        actor: UserId,
        req: WithdrawalRequest,
    ) -> Result<InitiatedTransaction, TransactionError> {
        self.check_minimum(req.amount)?;
        let cash_out_point = validate_external_id("cash_out_point", &req.cash_out_point)?;
        let source = self.resolve_source(actor, req.account_id).await?;
        let (fee, total) = self.quote(req.amount, OperationKind::Withdrawal)?;
        Self::advisory_debit(&source, total)?;

        let description =
            validate_description(req.description.as_deref(), TransactionKind::Withdrawal.default_description())?;
        let record = self.new_record(
            TransactionKind::Withdrawal,
            Some(source.id),
            Destination::ExternalReference {
                service: ExternalService::CashOut,
                provider: cash_out_point.clone(),
                identifier: cash_out_point,
            },
            req.amount,
            fee,
            &source,
            description,
            actor,
            Authorization::Otp,
        );
        self.open_pending(record, None).await
    }

    pub async fn verify_withdrawal(
        &self,
        actor: UserId,
        reference: TransactionRef,
        code: &str,
    ) -> Result<SettledTransaction, TransactionError> {
        self.verify_pending(actor, reference, code, TransactionKind::Withdrawal)
            .await
    }

    /// Withdraw a PENDING transaction before it is verified.
    ///
    /// Engine-level only; the HTTP gateway has no cancel route.
    pub async fn cancel(
        &self,
        actor: UserId,
        reference: TransactionRef,
    ) -> Result<TransactionRecord, TransactionError> {
        let record = self
            .store
            .get(reference)
            .await?
            .filter(|r| r.initiator == actor && r.authorization == Authorization::Otp)
            .ok_or(TransactionError::NotFound)?;

        let now = self.clock.now_ms();
        if !self
            .store
            .update_status_if(
                reference,
                TransactionStatus::Pending,
                TransactionStatus::Cancelled,
                now,
            )
            .await?
        {
            return Err(TransactionError::NotFound);
        }
        info!(reference = %reference, user_id = actor, "Transaction cancelled");

        Ok(TransactionRecord {
            status: TransactionStatus::Cancelled,
            updated_at: now,
            ..record
        })
    }

    /// Visible to the initiator and to holders of either account
    pub async fn get_transaction(
        &self,
        actor: UserId,
        reference: TransactionRef,
    ) -> Result<TransactionRecord, TransactionError> {
        let record = self
            .store
            .get(reference)
            .await?
            .ok_or(TransactionError::NotFound)?;
        if record.initiator == actor {
            return Ok(record);
        }

        let accounts = self.account_ids_of(actor).await?;
        if accounts.iter().any(|id| record.touches_account(*id)) {
            Ok(record)
        } else {
            Err(TransactionError::NotFound)
        }
    }

    pub async fn history(
        &self,
        actor: UserId,
        filter: &HistoryFilter,
    ) -> Result<Vec<TransactionRecord>, TransactionError> {
        let accounts = self.account_ids_of(actor).await?;
        self.store.list_for(actor, &accounts, filter).await
    }

    // ========================================================================
    // Officer operations
    // ========================================================================

    /// Transfer on behalf of a customer. No code challenge.
    pub async fn officer_transfer(
        &self,
        auth: OfficerAuthorization,
        req: OfficerTransferRequest,
    ) -> Result<SettledTransaction, TransactionError> {
        self.check_minimum(req.amount)?;
        let source = self
            .ledger
            .get(req.source_account_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(TransactionError::SourceAccountUnavailable)?;
        let destination = self
            .resolve_destination(&source, &req.destination_account_number)
            .await?;
        let (fee, total) = self.quote(req.amount, OperationKind::Transfer)?;
        Self::advisory_debit(&source, total)?;

        let description =
            validate_description(req.description.as_deref(), TransactionKind::Transfer.default_description())?;
        let record = self.new_record(
            TransactionKind::Transfer,
            Some(source.id),
            Destination::InternalAccount(destination.id),
            req.amount,
            fee,
            &source,
            description,
            auth.officer_id(),
            Authorization::Officer(auth.officer_id()),
        );
        warn!(
            reference = %record.reference,
            officer_id = auth.officer_id(),
            source_account_id = source.id,
            destination_account_id = destination.id,
            amount = record.amount,
            "Officer transfer without customer verification"
        );
        self.store.create(&record).await?;
        self.begin_settlement(record, None).await
    }

    /// Cash deposit at a branch. `total = amount + fee` is the cash taken in;
    /// `amount` is credited.
    pub async fn officer_deposit(
        &self,
        auth: OfficerAuthorization,
        req: DepositRequest,
    ) -> Result<SettledTransaction, TransactionError> {
        Self::check_positive(req.amount)?;
        let number = AccountNumber::new(&req.account_number)?;
        let destination = self
            .ledger
            .find_by_number(number.as_str())
            .await?
            .filter(|a| a.is_active)
            .ok_or(TransactionError::DestinationAccountUnavailable)?;
        let (fee, _) = self.quote(req.amount, OperationKind::Deposit)?;

        let description =
            validate_description(req.description.as_deref(), TransactionKind::Deposit.default_description())?;
        let record = self.new_record(
            TransactionKind::Deposit,
            None,
            Destination::InternalAccount(destination.id),
            req.amount,
            fee,
            &destination,
            description,
            auth.officer_id(),
            Authorization::Officer(auth.officer_id()),
        );
        warn!(
            reference = %record.reference,
            officer_id = auth.officer_id(),
            destination_account_id = destination.id,
            amount = record.amount,
            "Officer deposit"
        );
        self.store.create(&record).await?;
        self.begin_settlement(record, None).await
    }

    // ========================================================================
    // Sweeps (driven by the recovery worker)
    // ========================================================================

    /// Fail PENDING records whose verification window has passed
    pub async fn expire_pending(&self, batch_size: usize) -> Result<usize, TransactionError> {
        let now = self.clock.now_ms();
        let cutoff = now - self.config.pending_ttl_secs as i64 * 1_000;
        let stale = self
            .store
            .find_in_status_before(TransactionStatus::Pending, cutoff, batch_size)
            .await?;

        let reason = FailureReason::Expired.to_string();
        let mut expired = 0;
        for record in stale {
            if self
                .store
                .fail_if(record.reference, TransactionStatus::Pending, &reason, now)
                .await?
            {
                info!(reference = %record.reference, "Pending transaction expired");
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Re-drive one PROCESSING record from the posting journal
    pub async fn reconcile(
        &self,
        reference: TransactionRef,
    ) -> Result<TransactionStatus, TransactionError> {
        let record = self
            .store
            .get(reference)
            .await?
            .ok_or(TransactionError::NotFound)?;
        self.settlement.reconcile(&record).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn verify_pending(
        &self,
        actor: UserId,
        reference: TransactionRef,
        code: &str,
        kind: TransactionKind,
    ) -> Result<SettledTransaction, TransactionError> {
        let record = self
            .store
            .get(reference)
            .await?
            .filter(|r| {
                r.initiator == actor
                    && r.kind == kind
                    && r.authorization == Authorization::Otp
                    && r.status == TransactionStatus::Pending
            })
            .ok_or(TransactionError::NotFound)?;

        let reference_str = reference.to_string();
        if let Err(e) = self
            .otp
            .verify(actor, kind.otp_purpose(), Some(&reference_str), code)
            .await
        {
            if e.is_exhausted() {
                self.fail_pending(&record, FailureReason::TooManyAttempts)
                    .await?;
                return Err(TransactionError::TooManyAttempts);
            }
            return Err(e.into());
        }

        let now = self.clock.now_ms();
        if !self.store.mark_otp_verified(reference, now).await? {
            return Err(TransactionError::NotFound);
        }

        if record.amount >= self.config.high_value_threshold {
            let decision = match self.gate.check(actor, reference, record.amount).await {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(reference = %reference, gate = self.gate.name(), error = %e, "Identity gate error, denying");
                    GateDecision {
                        allowed: false,
                        status: STATUS_UNAVAILABLE.to_string(),
                    }
                }
            };
            if !decision.allowed {
                self.fail_pending(
                    &record,
                    FailureReason::IdentityNotVerified(decision.status.clone()),
                )
                .await?;
                return Err(TransactionError::IdentityNotVerified {
                    status: decision.status,
                });
            }
        }

        let record = TransactionRecord {
            otp_verified: true,
            ..record
        };
        self.begin_settlement(record, Some(actor)).await
    }

    /// PENDING -> PROCESSING, then run the saga
    async fn begin_settlement(
        &self,
        record: TransactionRecord,
        viewer: Option<UserId>,
    ) -> Result<SettledTransaction, TransactionError> {
        let now = self.clock.now_ms();
        if !self
            .store
            .update_status_if(
                record.reference,
                TransactionStatus::Pending,
                TransactionStatus::Processing,
                now,
            )
            .await?
        {
            return Err(TransactionError::NotFound);
        }
        let processing = TransactionRecord {
            status: TransactionStatus::Processing,
            updated_at: now,
            ..record
        };

        let settled = self.settlement.settle(&processing).await?;
        let balances = self.balances_for(&settled, viewer).await;
        Ok(SettledTransaction {
            record: settled,
            balances,
        })
    }

    async fn open_pending(
        &self,
        record: TransactionRecord,
        destination_masked: Option<String>,
    ) -> Result<InitiatedTransaction, TransactionError> {
        self.store.create(&record).await?;

        let challenge = match self
            .otp
            .issue(
                record.initiator,
                record.kind.otp_purpose(),
                Some(&record.reference.to_string()),
            )
            .await
        {
            Ok(challenge) => challenge,
            Err(e) => {
                self.fail_pending(&record, FailureReason::Execution(e.to_string()))
                    .await?;
                return Err(e.into());
            }
        };

        info!(
            reference = %record.reference,
            kind = %record.kind,
            user_id = record.initiator,
            amount = record.amount,
            fee = record.fee,
            otp_issued = challenge.delivered,
            "Transaction initiated"
        );

        Ok(InitiatedTransaction {
            reference: record.reference,
            kind: record.kind,
            status: record.status,
            amount: record.amount,
            fee: record.fee,
            total: record.total,
            currency: record.currency,
            destination_masked,
            challenge,
        })
    }

    async fn fail_pending(
        &self,
        record: &TransactionRecord,
        reason: FailureReason,
    ) -> Result<(), TransactionError> {
        let applied = self
            .store
            .fail_if(
                record.reference,
                TransactionStatus::Pending,
                &reason.to_string(),
                self.clock.now_ms(),
            )
            .await?;
        if applied {
            warn!(reference = %record.reference, reason = %reason, "Transaction failed");
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn new_record(
        &self,
        kind: TransactionKind,
        source_account_id: Option<AccountId>,
        destination: Destination,
        amount: Amount,
        fee: Amount,
        currency_of: &Account,
        description: String,
        initiator: UserId,
        authorization: Authorization,
    ) -> TransactionRecord {
        let now: TimestampMs = self.clock.now_ms();
        TransactionRecord {
            reference: TransactionRef::new(),
            kind,
            source_account_id,
            destination,
            amount,
            fee,
            total: amount + fee,
            currency: currency_of.currency,
            description,
            initiator,
            authorization,
            status: TransactionStatus::Pending,
            otp_verified: false,
            failure_reason: None,
            external_ref: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Explicit source must be the actor's active account; otherwise the
    /// actor's oldest active CHECKING account.
    async fn resolve_source(
        &self,
        actor: UserId,
        requested: Option<AccountId>,
    ) -> Result<Account, TransactionError> {
        let found = match requested {
            Some(id) => self
                .ledger
                .get(id)
                .await?
                .filter(|a| a.owner == actor && a.is_active),
            None => self
                .ledger
                .accounts_of(actor)
                .await?
                .into_iter()
                .find(|a| a.kind == AccountKind::Checking && a.is_active),
        };
        found.ok_or(TransactionError::SourceAccountUnavailable)
    }

    async fn resolve_destination(
        &self,
        source: &Account,
        raw_number: &str,
    ) -> Result<Account, TransactionError> {
        let number = AccountNumber::new(raw_number)?;
        let destination = self
            .ledger
            .find_by_number(number.as_str())
            .await?
            .filter(|a| a.is_active)
            .ok_or(TransactionError::DestinationAccountUnavailable)?;

        if destination.id == source.id {
            return Err(TransactionError::SameAccount);
        }
        if destination.currency != source.currency {
            return Err(TransactionError::CurrencyMismatch {
                source_currency: source.currency.to_string(),
                destination_currency: destination.currency.to_string(),
            });
        }
        Ok(destination)
    }

    fn check_minimum(&self, amount: Amount) -> Result<(), TransactionError> {
        if amount < self.config.min_amount {
            return Err(TransactionError::AmountTooSmall {
                amount,
                minimum: self.config.min_amount,
            });
        }
        Ok(())
    }

    fn check_positive(amount: Amount) -> Result<(), TransactionError> {
        if amount == 0 {
            return Err(TransactionError::Validation(
                "amount must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn quote(&self, amount: Amount, op: OperationKind) -> Result<(Amount, Amount), TransactionError> {
        let fee = self.fees.fee_for(amount, op);
        let total = amount
            .checked_add(fee)
            .ok_or_else(|| TransactionError::Validation("amount plus fee overflows".into()))?;
        Ok((fee, total))
    }

    fn advisory_debit(source: &Account, total: Amount) -> Result<(), TransactionError> {
        if !source.can_debit(total) {
            return Err(TransactionError::InsufficientFunds);
        }
        Ok(())
    }

    async fn account_ids_of(&self, actor: UserId) -> Result<Vec<AccountId>, TransactionError> {
        Ok(self
            .ledger
            .accounts_of(actor)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect())
    }

    /// Post-settlement balances. `viewer = None` means staff, who see both.
    async fn balances_for(
        &self,
        record: &TransactionRecord,
        viewer: Option<UserId>,
    ) -> UpdatedBalances {
        let visible_balance = |account: Option<Account>| {
            account
                .filter(|a| viewer.is_none_or(|v| a.owner == v))
                .map(|a| a.balance)
        };

        let source = match record.source_account_id {
            Some(id) => visible_balance(self.ledger.get(id).await.ok().flatten()),
            None => None,
        };
        let destination = match record.destination.internal_account() {
            Some(id) => visible_balance(self.ledger.get(id).await.ok().flatten()),
            None => None,
        };
        UpdatedBalances {
            source,
            destination,
        }
    }
}

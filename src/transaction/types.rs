//! Transaction record and request/response types

use std::fmt;

use crate::core_types::{AccountId, Amount, TimestampMs, TransactionRef, UserId};
use crate::fee::{OperationKind, ServiceKind};
use crate::money::Currency;
use crate::otp::{IssuedChallenge, OtpPurpose};

use super::state::TransactionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum TransactionKind {
    Transfer = 1,
    Deposit = 2,
    Withdrawal = 3,
    Payment = 4,
}

impl TransactionKind {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(TransactionKind::Transfer),
            2 => Some(TransactionKind::Deposit),
            3 => Some(TransactionKind::Withdrawal),
            4 => Some(TransactionKind::Payment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdrawal => "WITHDRAWAL",
            TransactionKind::Payment => "PAYMENT",
        }
    }

    /// Code purpose guarding this kind of transaction
    pub fn otp_purpose(&self) -> OtpPurpose {
        match self {
            TransactionKind::Payment => OtpPurpose::Utility,
            _ => OtpPurpose::Transaction,
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "Fund transfer",
            TransactionKind::Deposit => "Cash deposit",
            TransactionKind::Withdrawal => "Cash withdrawal",
            TransactionKind::Payment => "Utility payment",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRANSFER" => Ok(TransactionKind::Transfer),
            "DEPOSIT" => Ok(TransactionKind::Deposit),
            "WITHDRAWAL" => Ok(TransactionKind::Withdrawal),
            "PAYMENT" => Ok(TransactionKind::Payment),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// Off-ledger counterparty of a debit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalService {
    Utility(ServiceKind),
    CashOut,
}

impl ExternalService {
    pub fn id(&self) -> i16 {
        match self {
            ExternalService::Utility(_) => 1,
            ExternalService::CashOut => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalService::Utility(service) => service.as_str(),
            ExternalService::CashOut => "CASH_OUT",
        }
    }
}

/// Where the principal goes. Only `InternalAccount` is ever credited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    InternalAccount(AccountId),
    ExternalReference {
        service: ExternalService,
        provider: String,
        identifier: String,
    },
}

impl Destination {
    pub fn internal_account(&self) -> Option<AccountId> {
        match self {
            Destination::InternalAccount(id) => Some(*id),
            Destination::ExternalReference { .. } => None,
        }
    }
}

/// How the transaction was authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Otp,
    Officer(UserId),
}

/// Proof that a bank officer's session was verified upstream.
///
/// Only the session layer should construct this; holding one lets a
/// transaction skip the code challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficerAuthorization {
    officer_id: UserId,
}

impl OfficerAuthorization {
    pub fn verified(officer_id: UserId) -> Self {
        Self { officer_id }
    }

    pub fn officer_id(&self) -> UserId {
        self.officer_id
    }
}

/// Reason recorded with a FAILED transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InsufficientFunds,
    TooManyAttempts,
    IdentityNotVerified(String),
    Expired,
    Interrupted,
    Execution(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InsufficientFunds => write!(f, "Insufficient funds"),
            FailureReason::TooManyAttempts => write!(f, "Too many invalid verification attempts"),
            FailureReason::IdentityNotVerified(status) => {
                write!(f, "Identity verification required (status: {})", status)
            }
            FailureReason::Expired => write!(f, "Verification window expired"),
            FailureReason::Interrupted => write!(f, "Interrupted before any funds moved"),
            FailureReason::Execution(cause) => write!(f, "Execution failed: {}", cause),
        }
    }
}

/// Persisted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub reference: TransactionRef,
    pub kind: TransactionKind,
    /// Absent only for deposits
    pub source_account_id: Option<AccountId>,
    pub destination: Destination,
    pub amount: Amount,
    pub fee: Amount,
    /// `amount + fee`
    pub total: Amount,
    pub currency: Currency,
    pub description: String,
    pub initiator: UserId,
    pub authorization: Authorization,
    pub status: TransactionStatus,
    pub otp_verified: bool,
    pub failure_reason: Option<String>,
    /// Settlement reference issued to utility providers on completion
    pub external_ref: Option<String>,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub processed_at: Option<TimestampMs>,
}

impl TransactionRecord {
    pub fn operation_kind(&self) -> OperationKind {
        match (&self.kind, &self.destination) {
            (
                TransactionKind::Payment,
                Destination::ExternalReference {
                    service: ExternalService::Utility(service),
                    ..
                },
            ) => OperationKind::Utility(*service),
            (TransactionKind::Deposit, _) => OperationKind::Deposit,
            (TransactionKind::Withdrawal, _) => OperationKind::Withdrawal,
            _ => OperationKind::Transfer,
        }
    }

    /// Accounts whose holders may see this transaction
    pub fn touches_account(&self, account_id: AccountId) -> bool {
        self.source_account_id == Some(account_id)
            || self.destination.internal_account() == Some(account_id)
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Defaults to the actor's oldest active CHECKING account
    pub source_account_id: Option<AccountId>,
    pub destination_account_number: String,
    pub amount: Amount,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UtilityPaymentRequest {
    pub account_id: Option<AccountId>,
    pub service: ServiceKind,
    pub provider_code: String,
    pub service_number: String,
    pub amount: Amount,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub account_id: Option<AccountId>,
    /// Cash-out point (branch or ATM code)
    pub cash_out_point: String,
    pub amount: Amount,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OfficerTransferRequest {
    pub source_account_id: AccountId,
    pub destination_account_number: String,
    pub amount: Amount,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub account_number: String,
    pub amount: Amount,
    pub description: Option<String>,
}

/// History filter; newest first
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub status: Option<TransactionStatus>,
    pub kind: Option<TransactionKind>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            status: None,
            kind: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl HistoryFilter {
    pub const MAX_LIMIT: usize = 100;
    pub const MAX_OFFSET: usize = 1_000_000;

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.status.is_none_or(|s| s == record.status) && self.kind.is_none_or(|k| k == record.kind)
    }

    pub fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    pub fn clamped_offset(&self) -> usize {
        self.offset.min(Self::MAX_OFFSET)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of a successful initiation; the ledger is untouched
#[derive(Debug, Clone)]
pub struct InitiatedTransaction {
    pub reference: TransactionRef,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub amount: Amount,
    pub fee: Amount,
    pub total: Amount,
    pub currency: Currency,
    /// Masked destination account number (internal transfers)
    pub destination_masked: Option<String>,
    pub challenge: IssuedChallenge,
}

impl InitiatedTransaction {
    pub fn otp_issued(&self) -> bool {
        self.challenge.delivered
    }
}

/// Balances after settlement, as visible to the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatedBalances {
    pub source: Option<Amount>,
    /// Only when the requester also holds the destination account
    pub destination: Option<Amount>,
}

/// Terminal outcome of a settlement
#[derive(Debug, Clone)]
pub struct SettledTransaction {
    pub record: TransactionRecord,
    pub balances: UpdatedBalances,
}

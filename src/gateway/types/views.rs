//! Response DTOs
//!
//! Amounts are returned both as integer minor units and as a grouped
//! display string.

use serde::Serialize;
use utoipa::ToSchema;

use crate::core_types::{AccountId, Amount, TimestampMs};
use crate::money::{Currency, format_amount};
use crate::transaction::{
    Destination, InitiatedTransaction, SettledTransaction, TransactionRecord, UpdatedBalances,
};

/// Returned by every `initiate` endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatedView {
    #[schema(example = "01HZX3J8Q6V9T1K2M4N5P7R8S0")]
    pub reference: String,
    #[schema(example = "TRANSFER")]
    pub kind: String,
    #[schema(example = "PENDING")]
    pub status: String,
    pub amount: Amount,
    pub fee: Amount,
    pub total: Amount,
    #[schema(example = "795,000")]
    pub total_display: String,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "**** **** **** 4444")]
    pub destination_masked: Option<String>,
    /// The notifier accepted the verification code
    pub otp_issued: bool,
    pub otp_expires_at: TimestampMs,
    /// Plaintext code, development builds only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_code: Option<String>,
}

impl From<InitiatedTransaction> for InitiatedView {
    fn from(t: InitiatedTransaction) -> Self {
        let otp_issued = t.otp_issued();
        Self {
            reference: t.reference.to_string(),
            kind: t.kind.as_str().to_string(),
            status: t.status.as_str().to_string(),
            amount: t.amount,
            fee: t.fee,
            total: t.total,
            total_display: format_amount(t.total, t.currency),
            currency: t.currency,
            destination_masked: t.destination_masked,
            otp_issued,
            otp_expires_at: t.challenge.expires_at,
            dev_code: t.challenge.dev_code,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DestinationView {
    /// INTERNAL_ACCOUNT or the external service name
    #[schema(example = "INTERNAL_ACCOUNT")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl From<&Destination> for DestinationView {
    fn from(d: &Destination) -> Self {
        match d {
            Destination::InternalAccount(id) => Self {
                kind: "INTERNAL_ACCOUNT".to_string(),
                account_id: Some(*id),
                provider: None,
                identifier: None,
            },
            Destination::ExternalReference {
                service,
                provider,
                identifier,
            } => Self {
                kind: service.as_str().to_string(),
                account_id: None,
                provider: Some(provider.clone()),
                identifier: Some(identifier.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionView {
    pub reference: String,
    pub kind: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_account_id: Option<AccountId>,
    pub destination: DestinationView,
    pub amount: Amount,
    pub fee: Amount,
    pub total: Amount,
    pub amount_display: String,
    pub currency: Currency,
    pub description: String,
    pub otp_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<TimestampMs>,
}

impl From<&TransactionRecord> for TransactionView {
    fn from(r: &TransactionRecord) -> Self {
        Self {
            reference: r.reference.to_string(),
            kind: r.kind.as_str().to_string(),
            status: r.status.as_str().to_string(),
            source_account_id: r.source_account_id,
            destination: DestinationView::from(&r.destination),
            amount: r.amount,
            fee: r.fee,
            total: r.total,
            amount_display: format_amount(r.amount, r.currency),
            currency: r.currency,
            description: r.description.clone(),
            otp_verified: r.otp_verified,
            failure_reason: r.failure_reason.clone(),
            external_ref: r.external_ref.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
            processed_at: r.processed_at,
        }
    }
}

/// Balances after settlement, limited to accounts the caller may see
#[derive(Debug, Serialize, ToSchema)]
pub struct BalancesView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Amount>,
}

impl From<UpdatedBalances> for BalancesView {
    fn from(b: UpdatedBalances) -> Self {
        Self {
            source: b.source,
            destination: b.destination,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettledView {
    pub transaction: TransactionView,
    pub balances: BalancesView,
}

impl From<SettledTransaction> for SettledView {
    fn from(s: SettledTransaction) -> Self {
        Self {
            transaction: TransactionView::from(&s.record),
            balances: s.balances.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::TransactionRef;
    use crate::transaction::{Authorization, ExternalService, TransactionKind, TransactionStatus};

    fn record(destination: Destination) -> TransactionRecord {
        TransactionRecord {
            reference: TransactionRef::new(),
            kind: TransactionKind::Transfer,
            source_account_id: Some(1),
            destination,
            amount: 200_000,
            fee: 5_000,
            total: 205_000,
            currency: Currency::Vnd,
            description: "Rent".into(),
            initiator: 1001,
            authorization: Authorization::Otp,
            status: TransactionStatus::Completed,
            otp_verified: true,
            failure_reason: None,
            external_ref: None,
            created_at: 1,
            updated_at: 2,
            processed_at: Some(2),
        }
    }

    #[test]
    fn test_transaction_view_fields() {
        let view = TransactionView::from(&record(Destination::InternalAccount(2)));
        assert_eq!(view.status, "COMPLETED");
        assert_eq!(view.amount_display, "200,000");
        assert_eq!(view.destination.kind, "INTERNAL_ACCOUNT");
        assert_eq!(view.destination.account_id, Some(2));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("failure_reason").is_none());
        assert_eq!(json["currency"], "VND");
    }

    #[test]
    fn test_external_destination_view() {
        let view = DestinationView::from(&Destination::ExternalReference {
            service: ExternalService::CashOut,
            provider: "ATM-1".into(),
            identifier: "ATM-1".into(),
        });
        assert_eq!(view.kind, "CASH_OUT");
        assert!(view.account_id.is_none());
    }
}

//! Request DTOs and the validating JSON extractor
//!
//! Amounts travel as integer minor units. Shape checks (lengths, ranges)
//! happen here via `validator`; business rules stay in the engine.

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::response::ApiError;
use crate::core_types::{AccountId, Amount};
use crate::fee::ServiceKind;
use crate::transaction::{
    DepositRequest, HistoryFilter, OfficerTransferRequest, TransactionKind, TransactionStatus,
    TransferRequest, UtilityPaymentRequest, WithdrawalRequest,
};

// ============================================================================
// ValidatedJson: Axum Framework Integration
// ============================================================================

/// JSON body that has passed its `Validate` rules.
///
/// Handlers never see a body that failed deserialization or validation.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

// ============================================================================
// Customer Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TransferBody {
    /// Defaults to the caller's first active account
    pub source_account_id: Option<AccountId>,
    /// 16 digits; spaces and dashes are ignored
    #[validate(length(min = 16, max = 40))]
    #[schema(example = "5111 2222 3333 4444")]
    pub destination_account_number: String,
    #[validate(range(min = 1))]
    #[schema(example = 200000)]
    pub amount: Amount,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<TransferBody> for TransferRequest {
    fn from(body: TransferBody) -> Self {
        TransferRequest {
            source_account_id: body.source_account_id,
            destination_account_number: body.destination_account_number,
            amount: body.amount,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyBody {
    #[validate(length(min = 4, max = 10))]
    #[schema(example = "123456")]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UtilityPaymentBody {
    pub account_id: Option<AccountId>,
    pub service: ServiceKind,
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "EVN_HN")]
    pub provider_code: String,
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "PE01234567")]
    pub service_number: String,
    #[validate(range(min = 1))]
    pub amount: Amount,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<UtilityPaymentBody> for UtilityPaymentRequest {
    fn from(body: UtilityPaymentBody) -> Self {
        UtilityPaymentRequest {
            account_id: body.account_id,
            service: body.service,
            provider_code: body.provider_code,
            service_number: body.service_number,
            amount: body.amount,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WithdrawalBody {
    pub account_id: Option<AccountId>,
    /// ATM or branch identifier
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "ATM-HN-0042")]
    pub cash_out_point: String,
    #[validate(range(min = 1))]
    pub amount: Amount,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<WithdrawalBody> for WithdrawalRequest {
    fn from(body: WithdrawalBody) -> Self {
        WithdrawalRequest {
            account_id: body.account_id,
            cash_out_point: body.cash_out_point,
            amount: body.amount,
            description: body.description,
        }
    }
}

/// Query string of `GET /api/v1/transactions`
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// PENDING, PROCESSING, COMPLETED, FAILED or CANCELLED
    pub status: Option<String>,
    /// TRANSFER, DEPOSIT, WITHDRAWAL or PAYMENT
    pub kind: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
    #[validate(range(max = 1_000_000))]
    pub offset: Option<usize>,
}

impl HistoryQuery {
    pub fn into_filter(self) -> Result<HistoryFilter, ApiError> {
        let status = self
            .status
            .map(|s| s.parse::<TransactionStatus>())
            .transpose()
            .map_err(ApiError::bad_request)?;
        let kind = self
            .kind
            .map(|k| k.parse::<TransactionKind>())
            .transpose()
            .map_err(ApiError::bad_request)?;

        let defaults = HistoryFilter::default();
        Ok(HistoryFilter {
            status,
            kind,
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        })
    }
}

// ============================================================================
// Officer Requests
// ============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OfficerTransferBody {
    pub source_account_id: AccountId,
    #[validate(length(min = 16, max = 40))]
    pub destination_account_number: String,
    #[validate(range(min = 1))]
    pub amount: Amount,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<OfficerTransferBody> for OfficerTransferRequest {
    fn from(body: OfficerTransferBody) -> Self {
        OfficerTransferRequest {
            source_account_id: body.source_account_id,
            destination_account_number: body.destination_account_number,
            amount: body.amount,
            description: body.description,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DepositBody {
    #[validate(length(min = 16, max = 40))]
    pub account_number: String,
    #[validate(range(min = 1))]
    pub amount: Amount,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl From<DepositBody> for DepositRequest {
    fn from(body: DepositBody) -> Self {
        DepositRequest {
            account_number: body.account_number,
            amount: body.amount,
            description: body.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_body_validation() {
        let body: TransferBody = serde_json::from_str(
            r#"{"destination_account_number":"5111222233334444","amount":200000}"#,
        )
        .unwrap();
        assert!(body.validate().is_ok());

        let zero: TransferBody = serde_json::from_str(
            r#"{"destination_account_number":"5111222233334444","amount":0}"#,
        )
        .unwrap();
        assert!(zero.validate().is_err());

        let short: TransferBody =
            serde_json::from_str(r#"{"destination_account_number":"5111","amount":10}"#).unwrap();
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_negative_amount_rejected_by_serde() {
        let parsed = serde_json::from_str::<TransferBody>(
            r#"{"destination_account_number":"5111222233334444","amount":-5}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_service_kind_wire_format() {
        let body: UtilityPaymentBody = serde_json::from_str(
            r#"{"service":"PHONE_TOPUP","provider_code":"VT","service_number":"0912345678","amount":50000}"#,
        )
        .unwrap();
        assert_eq!(body.service, ServiceKind::PhoneTopup);
    }

    #[test]
    fn test_history_query_into_filter() {
        let query = HistoryQuery {
            status: Some("completed".into()),
            kind: None,
            limit: Some(5),
            offset: None,
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.status, Some(TransactionStatus::Completed));
        assert_eq!(filter.limit, 5);
        assert_eq!(filter.offset, 0);

        let far = HistoryQuery {
            offset: Some(usize::MAX),
            ..Default::default()
        };
        assert!(far.validate().is_err());

        let bad = HistoryQuery {
            status: Some("SETTLED".into()),
            ..Default::default()
        };
        assert!(bad.into_filter().is_err());
    }
}

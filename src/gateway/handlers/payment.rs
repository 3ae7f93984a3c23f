//! Utility bill payment handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::identity::Customer;
use super::super::state::AppState;
use super::super::types::{
    ApiResult, InitiatedView, SettledView, UtilityPaymentBody, ValidatedJson, VerifyBody, ok,
};
use super::helpers::parse_reference;

/// Initiate a utility payment
///
/// POST /api/v1/payments/utility
#[utoipa::path(
    post,
    path = "/api/v1/payments/utility",
    request_body = UtilityPaymentBody,
    responses(
        (status = 200, description = "Payment pending verification", body = InitiatedView),
        (status = 400, description = "Invalid parameters"),
        (status = 422, description = "Account unavailable or insufficient funds")
    ),
    security(("user_id" = [])),
    tag = "Payment"
)]
pub async fn initiate_utility_payment(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    ValidatedJson(body): ValidatedJson<UtilityPaymentBody>,
) -> ApiResult<InitiatedView> {
    let initiated = state
        .engine
        .initiate_utility_payment(user_id, body.into())
        .await?;
    ok(initiated.into())
}

/// Confirm a utility payment
///
/// POST /api/v1/payments/utility/{reference}/verify
#[utoipa::path(
    post,
    path = "/api/v1/payments/utility/{reference}/verify",
    params(
        ("reference" = String, Path, description = "Transaction reference (ULID)")
    ),
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Payment completed", body = SettledView),
        (status = 400, description = "Invalid or expired code"),
        (status = 404, description = "No pending payment with this reference"),
        (status = 429, description = "Too many invalid attempts")
    ),
    security(("user_id" = [])),
    tag = "Payment"
)]
pub async fn verify_utility_payment(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    Path(reference): Path<String>,
    ValidatedJson(body): ValidatedJson<VerifyBody>,
) -> ApiResult<SettledView> {
    let reference = parse_reference(&reference)?;
    let settled = state
        .engine
        .verify_utility_payment(user_id, reference, &body.code)
        .await?;
    ok(settled.into())
}

//! Cash withdrawal handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::identity::Customer;
use super::super::state::AppState;
use super::super::types::{
    ApiResult, InitiatedView, SettledView, ValidatedJson, VerifyBody, WithdrawalBody, ok,
};
use super::helpers::parse_reference;

/// Initiate a cash withdrawal
///
/// POST /api/v1/withdrawals
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals",
    request_body = WithdrawalBody,
    responses(
        (status = 200, description = "Withdrawal pending verification", body = InitiatedView),
        (status = 400, description = "Invalid parameters"),
        (status = 422, description = "Account unavailable or insufficient funds")
    ),
    security(("user_id" = [])),
    tag = "Withdrawal"
)]
pub async fn initiate_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    ValidatedJson(body): ValidatedJson<WithdrawalBody>,
) -> ApiResult<InitiatedView> {
    let initiated = state
        .engine
        .initiate_withdrawal(user_id, body.into())
        .await?;
    ok(initiated.into())
}

/// Confirm a cash withdrawal
///
/// POST /api/v1/withdrawals/{reference}/verify
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals/{reference}/verify",
    params(
        ("reference" = String, Path, description = "Transaction reference (ULID)")
    ),
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Withdrawal completed", body = SettledView),
        (status = 400, description = "Invalid or expired code"),
        (status = 404, description = "No pending withdrawal with this reference")
    ),
    security(("user_id" = [])),
    tag = "Withdrawal"
)]
pub async fn verify_withdrawal(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    Path(reference): Path<String>,
    ValidatedJson(body): ValidatedJson<VerifyBody>,
) -> ApiResult<SettledView> {
    let reference = parse_reference(&reference)?;
    let settled = state
        .engine
        .verify_withdrawal(user_id, reference, &body.code)
        .await?;
    ok(settled.into())
}

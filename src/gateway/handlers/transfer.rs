//! Account-to-account transfer handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};

use super::super::identity::Customer;
use super::super::state::AppState;
use super::super::types::{
    ApiResult, InitiatedView, SettledView, TransferBody, ValidatedJson, VerifyBody, ok,
};
use super::helpers::parse_reference;

/// Initiate a transfer
///
/// POST /api/v1/transfers
///
/// Creates a PENDING transaction and sends a verification code. Nothing
/// moves until the code is confirmed.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferBody,
    responses(
        (status = 200, description = "Transfer pending verification", body = InitiatedView),
        (status = 400, description = "Invalid parameters"),
        (status = 401, description = "Missing identity"),
        (status = 422, description = "Account unavailable or insufficient funds")
    ),
    security(("user_id" = [])),
    tag = "Transfer"
)]
pub async fn initiate_transfer(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    ValidatedJson(body): ValidatedJson<TransferBody>,
) -> ApiResult<InitiatedView> {
    let initiated = state
        .engine
        .initiate_transfer(user_id, body.into())
        .await?;
    tracing::info!(
        reference = %initiated.reference,
        user_id,
        total = initiated.total,
        "Transfer initiated"
    );
    ok(initiated.into())
}

/// Confirm a transfer with its verification code
///
/// POST /api/v1/transfers/{reference}/verify
#[utoipa::path(
    post,
    path = "/api/v1/transfers/{reference}/verify",
    params(
        ("reference" = String, Path, description = "Transaction reference (ULID)")
    ),
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Transfer completed", body = SettledView),
        (status = 400, description = "Invalid or expired code"),
        (status = 403, description = "Identity verification required"),
        (status = 404, description = "No pending transfer with this reference"),
        (status = 429, description = "Too many invalid attempts")
    ),
    security(("user_id" = [])),
    tag = "Transfer"
)]
pub async fn verify_transfer(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    Path(reference): Path<String>,
    ValidatedJson(body): ValidatedJson<VerifyBody>,
) -> ApiResult<SettledView> {
    let reference = parse_reference(&reference)?;
    let settled = state
        .engine
        .verify_transfer(user_id, reference, &body.code)
        .await?;
    ok(settled.into())
}

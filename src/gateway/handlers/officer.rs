//! Bank officer handlers
//!
//! Officer sessions are verified upstream; these routes skip the customer
//! code challenge and the high-value gate. Every call is audit-logged by
//! the engine.

use std::sync::Arc;

use axum::{Extension, extract::State};

use super::super::state::AppState;
use super::super::types::{
    ApiResult, DepositBody, OfficerTransferBody, SettledView, ValidatedJson, ok,
};
use crate::transaction::OfficerAuthorization;

/// Transfer on behalf of a customer
///
/// POST /api/v1/officer/transfers
#[utoipa::path(
    post,
    path = "/api/v1/officer/transfers",
    request_body = OfficerTransferBody,
    responses(
        (status = 200, description = "Transfer completed", body = SettledView),
        (status = 400, description = "Invalid parameters"),
        (status = 401, description = "Missing officer identity"),
        (status = 422, description = "Account unavailable or insufficient funds")
    ),
    security(("officer_id" = [])),
    tag = "Officer"
)]
pub async fn officer_transfer(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<OfficerAuthorization>,
    ValidatedJson(body): ValidatedJson<OfficerTransferBody>,
) -> ApiResult<SettledView> {
    let settled = state.engine.officer_transfer(auth, body.into()).await?;
    ok(settled.into())
}

/// Record a cash deposit
///
/// POST /api/v1/officer/deposits
#[utoipa::path(
    post,
    path = "/api/v1/officer/deposits",
    request_body = DepositBody,
    responses(
        (status = 200, description = "Deposit completed", body = SettledView),
        (status = 400, description = "Invalid parameters"),
        (status = 401, description = "Missing officer identity"),
        (status = 422, description = "Account unavailable")
    ),
    security(("officer_id" = [])),
    tag = "Officer"
)]
pub async fn officer_deposit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<OfficerAuthorization>,
    ValidatedJson(body): ValidatedJson<DepositBody>,
) -> ApiResult<SettledView> {
    let settled = state.engine.officer_deposit(auth, body.into()).await?;
    ok(settled.into())
}

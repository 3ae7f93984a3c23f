//! Transaction query handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::identity::Customer;
use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, HistoryQuery, TransactionView, ok};
use super::helpers::parse_reference;

/// Get one transaction
///
/// GET /api/v1/transactions/{reference}
///
/// Visible to the initiator and to holders of either account.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{reference}",
    params(
        ("reference" = String, Path, description = "Transaction reference (ULID)")
    ),
    responses(
        (status = 200, description = "Transaction", body = TransactionView),
        (status = 400, description = "Invalid reference"),
        (status = 404, description = "Transaction not found")
    ),
    security(("user_id" = [])),
    tag = "Transaction"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    Path(reference): Path<String>,
) -> ApiResult<TransactionView> {
    let reference = parse_reference(&reference)?;
    let record = state.engine.get_transaction(user_id, reference).await?;
    ok(TransactionView::from(&record))
}

/// List transactions, newest first
///
/// GET /api/v1/transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Transactions", body = Vec<TransactionView>),
        (status = 400, description = "Invalid filter")
    ),
    security(("user_id" = [])),
    tag = "Transaction"
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(Customer(user_id)): Extension<Customer>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransactionView>> {
    query
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let filter = query.into_filter()?;
    let records = state.engine.history(user_id, &filter).await?;
    ok(records.iter().map(TransactionView::from).collect())
}


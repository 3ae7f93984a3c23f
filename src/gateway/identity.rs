//! Caller identity
//!
//! Sessions are verified upstream; the gateway trusts `X-User-ID` and
//! `X-Officer-ID` as set by the session layer and only checks their shape.

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use super::types::{ApiError, error_codes};
use crate::core_types::UserId;
use crate::transaction::OfficerAuthorization;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const OFFICER_ID_HEADER: &str = "x-officer-id";

/// Authenticated customer, injected by [`customer_identity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Customer(pub UserId);

fn header_id(request: &Request<Body>, name: &str) -> Result<UserId, ApiError> {
    let raw = request
        .headers()
        .get(name)
        .ok_or_else(|| {
            ApiError::unauthorized(error_codes::MISSING_AUTH, format!("Missing {} header", name))
        })?
        .to_str()
        .map_err(|_| ApiError::unauthorized(error_codes::AUTH_FAILED, "Malformed identity header"))?;

    match raw.trim().parse::<UserId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::unauthorized(
            error_codes::AUTH_FAILED,
            "Malformed identity header",
        )),
    }
}

pub async fn customer_identity(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = header_id(&request, USER_ID_HEADER)?;
    request.extensions_mut().insert(Customer(user_id));
    Ok(next.run(request).await)
}

pub async fn officer_identity(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let officer_id = header_id(&request, OFFICER_ID_HEADER)?;
    request
        .extensions_mut()
        .insert(OfficerAuthorization::verified(officer_id));
    Ok(next.run(request).await)
}

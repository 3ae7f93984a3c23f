//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `error_codes`: Standard error code constants
//! - `ApiError`: Handler error carrying its HTTP status

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::transaction::TransactionError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response code: 0 for success, non-zero for errors
    #[schema(example = 0)]
    pub code: i32,
    /// Response message
    #[schema(example = "ok")]
    pub msg: String,
    /// Response data (only present when code == 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Handler Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<TransactionError> for ApiError {
    fn from(e: TransactionError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            TransactionError::AmountTooSmall { .. }
            | TransactionError::SameAccount
            | TransactionError::CurrencyMismatch { .. }
            | TransactionError::Validation(_) => error_codes::INVALID_PARAMETER,
            TransactionError::InsufficientFunds => error_codes::INSUFFICIENT_BALANCE,
            TransactionError::SourceAccountUnavailable
            | TransactionError::DestinationAccountUnavailable => error_codes::ACCOUNT_UNAVAILABLE,
            TransactionError::InvalidCode { .. } | TransactionError::ChallengeNotFound => {
                error_codes::INVALID_CODE
            }
            TransactionError::ChallengeExpired => error_codes::CODE_EXPIRED,
            TransactionError::TooManyAttempts => error_codes::TOO_MANY_ATTEMPTS,
            TransactionError::IdentityNotVerified { .. } => error_codes::IDENTITY_NOT_VERIFIED,
            TransactionError::NotFound => error_codes::TRANSACTION_NOT_FOUND,
            TransactionError::Execution(_) => error_codes::EXECUTION_FAILED,
            TransactionError::Storage(_) => error_codes::SERVICE_UNAVAILABLE,
        };

        // Backend detail stays in the log
        let msg = match &e {
            TransactionError::Storage(detail) => {
                tracing::error!(error_code = e.code(), detail = %detail, "Storage failure");
                "Service temporarily unavailable".to_string()
            }
            _ => e.to_string(),
        };
        Self::new(status, code, msg)
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const INVALID_CODE: i32 = 1003;
    pub const CODE_EXPIRED: i32 = 1004;
    pub const ACCOUNT_UNAVAILABLE: i32 = 1005;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const IDENTITY_NOT_VERIFIED: i32 = 2003;

    // Resource errors (4xxx)
    pub const TRANSACTION_NOT_FOUND: i32 = 4001;
    pub const TOO_MANY_ATTEMPTS: i32 = 4291;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const EXECUTION_FAILED: i32 = 5002;
}

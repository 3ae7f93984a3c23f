//! Gateway types module
//!
//! ## Input Types
//! - [`ValidatedJson`]: Axum extractor that runs `validator` rules
//! - Request bodies for customer and officer endpoints
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - Transaction views
//!
//! ## Submodules
//! - [`requests`]: Request DTOs
//! - [`response`]: Response envelope, errors and error codes
//! - [`views`]: Response DTOs

pub mod requests;
pub mod response;
pub mod views;

pub use requests::{
    DepositBody, HistoryQuery, OfficerTransferBody, TransferBody, UtilityPaymentBody,
    ValidatedJson, VerifyBody, WithdrawalBody,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
pub use views::{BalancesView, DestinationView, InitiatedView, SettledView, TransactionView};

//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{
    BalancesView, DepositBody, DestinationView, InitiatedView, OfficerTransferBody, SettledView,
    TransactionView, TransferBody, UtilityPaymentBody, VerifyBody, WithdrawalBody,
};

/// Identity headers set by the upstream session layer
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-ID",
                    "Customer id of a session verified upstream",
                ))),
            );
            components.add_security_scheme(
                "officer_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-Officer-ID",
                    "Bank officer id of a session verified upstream",
                ))),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Retail Ledger API",
        version = "1.0.0",
        description = "Code-verified transfers, bill payments and withdrawals over an account ledger.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::transfer::initiate_transfer,
        crate::gateway::handlers::transfer::verify_transfer,
        crate::gateway::handlers::payment::initiate_utility_payment,
        crate::gateway::handlers::payment::verify_utility_payment,
        crate::gateway::handlers::withdrawal::initiate_withdrawal,
        crate::gateway::handlers::withdrawal::verify_withdrawal,
        crate::gateway::handlers::transaction::get_transaction,
        crate::gateway::handlers::transaction::list_transactions,
        crate::gateway::handlers::officer::officer_transfer,
        crate::gateway::handlers::officer::officer_deposit,
    ),
    components(
        schemas(
            HealthResponse,
            TransferBody,
            VerifyBody,
            UtilityPaymentBody,
            WithdrawalBody,
            OfficerTransferBody,
            DepositBody,
            InitiatedView,
            SettledView,
            TransactionView,
            DestinationView,
            BalancesView,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Transfer", description = "Account-to-account transfers"),
        (name = "Payment", description = "Utility bill payments"),
        (name = "Withdrawal", description = "Cash withdrawals"),
        (name = "Transaction", description = "History and lookup"),
        (name = "Officer", description = "Branch operations (officer identity required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Retail Ledger API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let json = ApiDoc::openapi().to_json();
        assert!(json.is_ok());
        assert!(json.unwrap().contains("Retail Ledger API"));
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        assert!(paths.paths.contains_key("/api/v1/health"));
        assert!(paths.paths.contains_key("/api/v1/transfers"));
        assert!(paths.paths.contains_key("/api/v1/transfers/{reference}/verify"));
        assert!(paths.paths.contains_key("/api/v1/officer/deposits"));
    }

    #[test]
    fn test_security_schemes_registered() {
        let components = ApiDoc::openapi().components.expect("should have components");
        assert!(components.security_schemes.contains_key("user_id"));
        assert!(components.security_schemes.contains_key("officer_id"));
    }
}

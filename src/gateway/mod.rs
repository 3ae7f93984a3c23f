pub mod handlers;
pub mod identity;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the complete router
pub fn router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Customer Routes (X-User-ID required)
    // ==========================================================================
    let customer_routes = Router::new()
        .route("/transfers", post(handlers::initiate_transfer))
        .route(
            "/transfers/{reference}/verify",
            post(handlers::verify_transfer),
        )
        .route("/payments/utility", post(handlers::initiate_utility_payment))
        .route(
            "/payments/utility/{reference}/verify",
            post(handlers::verify_utility_payment),
        )
        .route("/withdrawals", post(handlers::initiate_withdrawal))
        .route(
            "/withdrawals/{reference}/verify",
            post(handlers::verify_withdrawal),
        )
        .route("/transactions", get(handlers::list_transactions))
        .route("/transactions/{reference}", get(handlers::get_transaction))
        .layer(from_fn(identity::customer_identity));

    // ==========================================================================
    // Officer Routes (X-Officer-ID required)
    // ==========================================================================
    let officer_routes = Router::new()
        .route("/transfers", post(handlers::officer_transfer))
        .route("/deposits", post(handlers::officer_deposit))
        .layer(from_fn(identity::officer_identity));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/officer", officer_routes)
        .nest("/api/v1", customer_routes)
        .with_state(state)
        // Stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {} (is port {} already in use?)",
            addr,
            e,
            config.port
        )
    })?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::account::{AccountNumber, NewAccount};
    use crate::fee::FeeSchedule;
    use crate::ledger::{InMemoryLedger, Ledger};
    use crate::otp::{ChallengeManager, HashParams, InMemoryOtpStore, MemoryNotifier, OtpConfig};
    use crate::time::ManualTimeSource;
    use crate::transaction::{EngineConfig, InMemoryTransactionStore, StaticGate, TransactionEngine};

    const ALICE: u64 = 1001;
    const BOB: u64 = 1002;
    const OFFICER: u64 = 9;

    struct TestApp {
        app: Router,
        notifier: Arc<MemoryNotifier>,
        ledger: Arc<InMemoryLedger>,
        alice_account: u64,
    }

    async fn test_app() -> TestApp {
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
        let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
        let alice = ledger
            .open_account(
                NewAccount::checking(ALICE, 1_000_000)
                    .with_number(AccountNumber::new("4111222233334444").unwrap()),
            )
            .await
            .unwrap();
        ledger
            .open_account(
                NewAccount::checking(BOB, 50_000)
                    .with_number(AccountNumber::new("5111222233334444").unwrap()),
            )
            .await
            .unwrap();

        let notifier = Arc::new(MemoryNotifier::new());
        let otp = ChallengeManager::new(
            Arc::new(InMemoryOtpStore::new()),
            notifier.clone(),
            clock.clone(),
            OtpConfig {
                hash: HashParams {
                    memory_kib: 64,
                    iterations: 1,
                    parallelism: 1,
                },
                ..OtpConfig::default()
            },
        )
        .unwrap();
        let engine = TransactionEngine::new(
            ledger.clone(),
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(otp),
            Arc::new(StaticGate::allow_all()),
            clock,
            FeeSchedule::default(),
            EngineConfig::default(),
        );

        TestApp {
            app: router(Arc::new(AppState::new(Arc::new(engine), None))),
            notifier,
            ledger,
            alice_account: alice.id,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, header: (&str, u64), body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(header.0, header.1.to_string())
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_as(uri: &str, user_id: u64) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_in_memory() {
        let t = test_app().await;
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["storage"], "memory");
    }

    #[tokio::test]
    async fn test_transfer_over_http() {
        let t = test_app().await;

        let (status, body) = send(
            &t.app,
            post_json(
                "/api/v1/transfers",
                ("x-user-id", ALICE),
                json!({
                    "destination_account_number": "5111-2222-3333-4444",
                    "amount": 200000,
                    "description": "Rent"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["status"], "PENDING");
        assert_eq!(body["data"]["fee"], 5000);
        assert_eq!(body["data"]["otp_issued"], true);
        assert_eq!(body["data"]["destination_masked"], "**** **** **** 4444");
        let reference = body["data"]["reference"].as_str().unwrap().to_string();

        let code = t.notifier.last_code_for(ALICE).unwrap();
        let (status, body) = send(
            &t.app,
            post_json(
                &format!("/api/v1/transfers/{}/verify", reference),
                ("x-user-id", ALICE),
                json!({ "code": code }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["transaction"]["status"], "COMPLETED");
        assert_eq!(body["data"]["balances"]["source"], 795_000);
        // Bob's balance is not Alice's to see
        assert!(body["data"]["balances"].get("destination").is_none());

        let (status, body) = send(
            &t.app,
            get_as(&format!("/api/v1/transactions/{}", reference), BOB),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["amount"], 200_000);
    }

    #[tokio::test]
    async fn test_missing_identity_rejected() {
        let t = test_app().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/transfers")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"destination_account_number": "5111222233334444", "amount": 200000})
                    .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&t.app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], types::error_codes::MISSING_AUTH);
    }

    #[tokio::test]
    async fn test_validation_and_engine_errors() {
        let t = test_app().await;

        let (status, body) = send(
            &t.app,
            post_json(
                "/api/v1/transfers",
                ("x-user-id", ALICE),
                json!({"destination_account_number": "5111222233334444", "amount": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_PARAMETER);

        let (status, body) = send(
            &t.app,
            post_json(
                "/api/v1/transfers",
                ("x-user-id", ALICE),
                json!({"destination_account_number": "4111222233334444", "amount": 20000}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_PARAMETER);
        assert_eq!(t.notifier.delivery_count(), 0);

        let (status, _) = send(
            &t.app,
            get_as("/api/v1/transactions/not-a-reference", ALICE),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &t.app,
            get_as("/api/v1/transactions?offset=18446744073709551615", ALICE),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_PARAMETER);
    }

    #[tokio::test]
    async fn test_wrong_code_then_history() {
        let t = test_app().await;
        let (_, body) = send(
            &t.app,
            post_json(
                "/api/v1/withdrawals",
                ("x-user-id", ALICE),
                json!({"cash_out_point": "ATM-HN-0042", "amount": 100000}),
            ),
        )
        .await;
        let reference = body["data"]["reference"].as_str().unwrap().to_string();

        let code = t.notifier.last_code_for(ALICE).unwrap();
        let wrong: String = code
            .chars()
            .map(|c| if c == '9' { '0' } else { (c as u8 + 1) as char })
            .collect();
        let (status, body) = send(
            &t.app,
            post_json(
                &format!("/api/v1/withdrawals/{}/verify", reference),
                ("x-user-id", ALICE),
                json!({ "code": wrong }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], types::error_codes::INVALID_CODE);

        let (status, body) = send(
            &t.app,
            get_as("/api/v1/transactions?status=pending", ALICE),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let listed = body["data"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["kind"], "WITHDRAWAL");

        // No customer cancel route
        let (status, _) = send(
            &t.app,
            post_json(
                &format!("/api/v1/transactions/{}/cancel", reference),
                ("x-user-id", ALICE),
                json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let balance = t.ledger.get(t.alice_account).await.unwrap().unwrap().balance;
        assert_eq!(balance, 1_000_000);
    }

    #[tokio::test]
    async fn test_officer_deposit() {
        let t = test_app().await;

        let (status, _) = send(
            &t.app,
            post_json(
                "/api/v1/officer/deposits",
                ("x-user-id", ALICE),
                json!({"account_number": "4111222233334444", "amount": 500000}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &t.app,
            post_json(
                "/api/v1/officer/deposits",
                ("x-officer-id", OFFICER),
                json!({"account_number": "4111 2222 3333 4444", "amount": 500000}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["data"]["transaction"]["kind"], "DEPOSIT");
        assert_eq!(body["data"]["balances"]["destination"], 1_500_000);
    }
}

//! HTTP API layer with Axum routes.
//!
//! This crate exposes the engine's entry points:
//! - Invoice evaluation and application
//! - Reservation release
//! - Wallet-to-wallet transfers
//! - Wallet provisioning, funding, and ledger reads

pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kasira_store::EngineService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The transactional engine entry point.
    pub service: Arc<EngineService>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use kasira_core::compliance::ComplianceVerificationService;
    use kasira_core::customer::{Customer, CustomerDirectory};
    use kasira_core::events::{EventSink, InMemoryEventSink};
    use kasira_shared::config::EngineConfig;
    use kasira_shared::types::CustomerId;
    use kasira_store::compliance::{InMemoryCustomerDirectory, StaticComplianceService};

    fn router_with_customer() -> (Router, CustomerId) {
        let directory = Arc::new(InMemoryCustomerDirectory::new());
        let customer = Customer {
            id: CustomerId::new(),
            display_name: "Ayu".to_string(),
            kyc_verified_up_to: Some(rust_decimal::Decimal::from(1_000_000)),
            risk_flagged: false,
        };
        directory.upsert(customer.clone());

        let service = EngineService::new(
            &EngineConfig::default(),
            Arc::new(StaticComplianceService::new()) as Arc<dyn ComplianceVerificationService>,
            directory as Arc<dyn CustomerDirectory>,
            Arc::new(InMemoryEventSink::new()) as Arc<dyn EventSink>,
        );
        let router = create_router(AppState {
            service: Arc::new(service),
        });
        (router, customer.id)
    }

    async fn json_request(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (router, _) = router_with_customer();
        let response = router
            .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wallet_lifecycle_over_http() {
        let (router, customer_id) = router_with_customer();

        let (status, wallet) = json_request(
            &router,
            "POST",
            "/api/v1/wallets",
            json!({
                "owner": customer_id.into_inner(),
                "mode": "persistent",
                "currency": "USD",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let wallet_id = wallet["id"].as_str().unwrap().to_string();

        let (status, _) = json_request(
            &router,
            "POST",
            &format!("/api/v1/wallets/{wallet_id}/deposit"),
            json!({"amount": "10000", "idempotency_key": "fund-1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, outcome) = json_request(
            &router,
            "POST",
            "/api/v1/invoices/evaluate",
            json!({
                "wallet_id": wallet_id,
                "idempotency_key": "apply-1",
                "invoice": {
                    "reference": "INV-1",
                    "amount": "3000",
                    "currency": "USD",
                    "customer": customer_id.into_inner(),
                    "due_date": "2026-12-31",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["verdict"]["verdict"], "accept");
        assert_eq!(outcome["invoice_status"], "paid");

        let (status, fetched) = json_request(
            &router,
            "GET",
            &format!("/api/v1/wallets/{wallet_id}"),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["available"], "7000");
    }

    #[tokio::test]
    async fn test_unknown_wallet_is_404_with_stable_code() {
        let (router, _) = router_with_customer();
        let (status, body) = json_request(
            &router,
            "GET",
            &format!("/api/v1/wallets/{}", uuid::Uuid::now_v7()),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "WALLET_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_422() {
        let (router, customer_id) = router_with_customer();
        let (_, wallet) = json_request(
            &router,
            "POST",
            "/api/v1/wallets",
            json!({
                "owner": customer_id.into_inner(),
                "mode": "persistent",
                "currency": "USD",
            }),
        )
        .await;
        let wallet_id = wallet["id"].as_str().unwrap().to_string();

        let (status, body) = json_request(
            &router,
            "POST",
            "/api/v1/invoices/evaluate",
            json!({
                "wallet_id": wallet_id,
                "idempotency_key": "apply-1",
                "invoice": {
                    "reference": "INV-1",
                    "amount": "3000",
                    "currency": "USD",
                    "customer": customer_id.into_inner(),
                    "due_date": "2026-12-31",
                },
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "INSUFFICIENT_BALANCE");
    }
}

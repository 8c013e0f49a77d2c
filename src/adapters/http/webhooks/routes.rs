//! Axum router for the webhook ingress.

use axum::middleware::from_fn_with_state;
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::cors::{cors_middleware, CorsPolicy};
use super::handlers::{handle_webhook, missing_source, WebhookAppState};

/// Webhook routes.
///
/// # Routes
/// - `POST /webhooks/:source` - Verify and process a gateway event
/// - `/webhooks`, `/webhooks/` - Rejected with 400 (no source)
///
/// Every method is routed so that non-POST requests get a JSON 405 rather
/// than axum's empty one.
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/webhooks", any(missing_source))
        .route("/webhooks/", any(missing_source))
        .route("/webhooks/:source", any(handle_webhook))
}

/// Complete ingress: routes, CORS, and request tracing.
pub fn webhook_router(state: WebhookAppState, cors: CorsPolicy) -> Router {
    webhook_routes()
        .layer(from_fn_with_state(cors, cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::adapters::http::webhooks::WebhookAdapterRegistry;
    use crate::adapters::memory::{InMemoryRecordStore, InMemoryTokenWallet};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::application::handlers::GatewayWebhookHandler;
    use crate::application::services::{CatalogSyncService, LedgerService, SubscriptionSyncService};
    use crate::domain::foundation::{PaymentTransactionId, WalletId};
    use crate::ports::Table;

    struct TestApp {
        store: Arc<InMemoryRecordStore>,
        wallet: Arc<InMemoryTokenWallet>,
        router: Router,
    }

    fn app_with(gateway: MockPaymentGateway) -> TestApp {
        let store = Arc::new(InMemoryRecordStore::new());
        let wallet = Arc::new(
            InMemoryTokenWallet::new().with_wallet("user-1", WalletId::new("wallet-1").unwrap()),
        );
        let handler = GatewayWebhookHandler::new(
            Arc::new(gateway),
            LedgerService::new(store.clone(), wallet.clone()),
            CatalogSyncService::new(store.clone(), "price_FREE"),
            SubscriptionSyncService::new(store.clone()),
        );
        let registry = WebhookAdapterRegistry::new().with_handler(handler);
        let router = webhook_router(WebhookAppState::new(registry), CorsPolicy::allow_any());

        TestApp {
            store,
            wallet,
            router,
        }
    }

    fn app() -> TestApp {
        app_with(MockPaymentGateway::new())
    }

    fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("stripe-signature", "t=1,v1=00")
            .body(Body::from(body))
            .unwrap()
    }

    fn seed_pending(store: &InMemoryRecordStore, tokens: i64) -> String {
        let id = PaymentTransactionId::new().to_string();
        store.seed(
            Table::PaymentTransactions,
            json!({
                "id": id,
                "gateway_name": "stripe",
                "gateway_transaction_id": null,
                "user_id": "user-1",
                "target_wallet_id": "wallet-1",
                "status": "PENDING",
                "tokens_to_award": tokens,
                "metadata": {}
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        id
    }

    fn checkout(transaction_id: &str) -> Vec<u8> {
        MockPaymentGateway::event_payload(
            "checkout.session.completed",
            json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "mode": "payment",
                "customer": "cus_1",
                "metadata": {"internal_payment_id": transaction_id}
            }),
        )
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn preflight_gets_204_with_cors_headers() {
        let TestApp { router, store, .. } = app();

        let response = router
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/webhooks/stripe")
                    .header(header::ORIGIN, "https://dashboard.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn non_post_is_405() {
        let response = app()
            .router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/webhooks/stripe")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert_eq!(json_body(response).await["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn missing_source_is_400() {
        for uri in ["/webhooks", "/webhooks/"] {
            let response = app().router.oneshot(post(uri, vec![])).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn unknown_source_is_404_naming_it() {
        let response = app()
            .router
            .oneshot(post("/webhooks/paypal", vec![]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("paypal"));
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_without_writes() {
        let TestApp { router, store, .. } = app();
        let tx = seed_pending(&store, 100);

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/stripe")
                    .body(Body::from(checkout(&tx)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn bad_signature_is_400() {
        let TestApp { router, store, wallet } = app_with(MockPaymentGateway::rejecting_webhooks());
        let tx = seed_pending(&store, 100);

        let response = router.oneshot(post("/webhooks/stripe", checkout(&tx))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.mutation_count(), 0);
        assert!(wallet.credit_calls().is_empty());
    }

    #[tokio::test]
    async fn processed_checkout_returns_transaction_id() {
        let TestApp { router, store, wallet } = app();
        let tx = seed_pending(&store, 1000);

        let response = router.oneshot(post("/webhooks/stripe", checkout(&tx))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Webhook processed");
        assert_eq!(body["transactionId"], tx.as_str());
        assert_eq!(wallet.credit_calls()[0].amount, "1000");
    }

    #[tokio::test]
    async fn unknown_transaction_is_404() {
        let TestApp { router, store, .. } = app();
        let missing = PaymentTransactionId::new().to_string();

        let response = router
            .oneshot(post("/webhooks/stripe", checkout(&missing)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["error"],
            format!("Payment transaction not found: {}", missing)
        );
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn ledger_write_failure_is_500_with_transaction() {
        let TestApp { router, store, wallet } = app();
        let tx = seed_pending(&store, 100);
        store.fail_writes_to(Table::PaymentTransactions);

        let response = router.oneshot(post("/webhooks/stripe", checkout(&tx))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["transactionId"], tx.as_str());
        assert!(wallet.credit_calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let response = app()
            .router
            .oneshot(post(
                "/webhooks/stripe",
                MockPaymentGateway::event_payload("charge.refunded", json!({"id": "ch_1"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn source_lookup_ignores_case() {
        let response = app()
            .router
            .oneshot(post(
                "/webhooks/Stripe",
                MockPaymentGateway::event_payload("charge.refunded", json!({"id": "ch_1"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

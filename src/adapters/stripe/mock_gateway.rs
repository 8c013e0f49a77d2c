//! Mock payment gateway for testing.
//!
//! Speaks Stripe's webhook body format but skips HMAC checks, and serves
//! subscriptions, products, and prices from in-memory maps. Supports:
//! - Error injection per method
//! - Call tracking
//! - Signature rejection

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::webhook::{
    GatewayPrice, GatewayProduct, GatewaySubscription, VerificationError, WebhookEvent,
};
use crate::ports::{PaymentError, PaymentGateway};

use super::stripe_gateway::{STRIPE_GATEWAY_NAME, STRIPE_SIGNATURE_HEADER};
use super::webhook_types::parse_event;

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
/// gateway.add_subscription(subscription);
/// gateway.set_method_error("fetch_price", PaymentError::network("timeout"));
///
/// let body = MockPaymentGateway::event_payload("price.deleted", json!({...}));
/// let event = gateway.verify_and_parse(&body, Some("t=1,v1=00")).await?;
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    subscriptions: HashMap<String, GatewaySubscription>,
    products: HashMap<String, GatewayProduct>,
    prices: HashMap<String, GatewayPrice>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    call_log: Vec<MethodCall>,

    reject_signatures: bool,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails every signature check.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().reject_signatures = true;
        mock
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_subscription(&self, subscription: GatewaySubscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_product(&self, product: GatewayProduct) {
        self.state().products.insert(product.id.clone(), product);
    }

    pub fn add_price(&self, price: GatewayPrice) {
        self.state().prices.insert(price.id.clone(), price);
    }

    /// Fail every call to `method` with `error`.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Payload Builders
    // ════════════════════════════════════════════════════════════════════════════

    /// Stripe-shaped webhook body wrapping `object`.
    pub fn event_payload(event_type: &str, object: Value) -> Vec<u8> {
        json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "object": "event",
            "type": event_type,
            "created": chrono::Utc::now().timestamp(),
            "livemode": false,
            "data": { "object": object }
        })
        .to_string()
        .into_bytes()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internals
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self, method: &str, args: Vec<String>) {
        self.state().call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
    }

    fn check_error(&self, method: &str) -> Result<(), PaymentError> {
        match self.state().method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn name(&self) -> &str {
        STRIPE_GATEWAY_NAME
    }

    fn signature_header(&self) -> &str {
        STRIPE_SIGNATURE_HEADER
    }

    async fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookEvent, VerificationError> {
        self.record_call("verify_and_parse", vec![signature.unwrap_or_default().to_string()]);

        if self.state().reject_signatures {
            return Err(VerificationError::SignatureMismatch);
        }
        if signature.map_or(true, |s| s.trim().is_empty()) {
            return Err(VerificationError::MissingSignature);
        }

        parse_event(payload)
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        self.record_call("fetch_subscription", vec![subscription_id.to_string()]);
        self.check_error("fetch_subscription")?;

        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("Subscription {}", subscription_id)))
    }

    async fn fetch_product(&self, product_id: &str) -> Result<GatewayProduct, PaymentError> {
        self.record_call("fetch_product", vec![product_id.to_string()]);
        self.check_error("fetch_product")?;

        self.state()
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("Product {}", product_id)))
    }

    async fn fetch_price(&self, price_id: &str) -> Result<GatewayPrice, PaymentError> {
        self.record_call("fetch_price", vec![price_id.to_string()]);
        self.check_error("fetch_price")?;

        self.state()
            .prices
            .get(price_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found(&format!("Price {}", price_id)))
    }
}

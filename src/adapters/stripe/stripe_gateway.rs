//! Stripe gateway adapter.
//!
//! Implements the `PaymentGateway` port: webhook signature verification,
//! event parsing, and REST lookups of subscriptions, products, and prices.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret);
//! let gateway = StripeGateway::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::webhook::{
    GatewayPrice, GatewayProduct, GatewaySubscription, VerificationError, WebhookEvent,
};
use crate::ports::{PaymentError, PaymentErrorCode, PaymentGateway};

use super::webhook_types::{
    parse_event, SignatureHeader, StripePrice, StripeProduct, StripeSubscription,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

pub const STRIPE_GATEWAY_NAME: &str = "stripe";

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Reject events whose livemode flag is false.
    require_livemode: bool,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self::from_secrets(
            SecretString::new(api_key.into()),
            SecretString::new(webhook_secret.into()),
        )
    }

    /// Build from secrets already loaded by the config layer.
    pub fn from_secrets(api_key: SecretString, webhook_secret: SecretString) -> Self {
        Self {
            api_key,
            webhook_secret,
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

/// Stripe implementation of `PaymentGateway`.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Verify webhook signature using HMAC-SHA256 over `"{t}.{body}"`.
    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
    ) -> Result<(), VerificationError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(VerificationError::TimestampOutOfTolerance { age_secs: age });
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(VerificationError::TimestampOutOfTolerance { age_secs: age });
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
            .map_err(|_| VerificationError::MalformedSignature("unusable signing secret".into()))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())));

        if !matched {
            tracing::warn!("Invalid webhook signature");
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, resource: &str) -> Result<T, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::not_found(resource));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &error_text));
        }

        response.json().await.map_err(|e| {
            PaymentError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

fn api_error(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        429 => PaymentErrorCode::RateLimitExceeded,
        500..=599 => PaymentErrorCode::NetworkError,
        _ => PaymentErrorCode::ProviderError,
    };

    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status));
            let err = PaymentError::new(code, format!("Stripe API error: {}", message));
            match parsed.error.code {
                Some(provider_code) => err.with_provider_code(provider_code),
                None => err,
            }
        }
        Err(_) => PaymentError::new(code, format!("Stripe API error: HTTP {} {}", status, body)),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
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
        let signature = signature.ok_or(VerificationError::MissingSignature)?;
        let header = SignatureHeader::parse(signature)?;
        self.verify_signature(payload, &header)?;

        let event = parse_event(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            e
        })?;

        if self.config.require_livemode && !event.livemode {
            tracing::warn!(event_id = %event.id, "Rejected test mode event in production");
            return Err(VerificationError::LivemodeMismatch);
        }

        Ok(event)
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<GatewaySubscription, PaymentError> {
        self.get::<StripeSubscription>(
            &format!("/v1/subscriptions/{}", subscription_id),
            &format!("Subscription {}", subscription_id),
        )
        .await
        .map(GatewaySubscription::from)
    }

    async fn fetch_product(&self, product_id: &str) -> Result<GatewayProduct, PaymentError> {
        self.get::<StripeProduct>(
            &format!("/v1/products/{}", product_id),
            &format!("Product {}", product_id),
        )
        .await
        .map(GatewayProduct::from)
    }

    async fn fetch_price(&self, price_id: &str) -> Result<GatewayPrice, PaymentError> {
        self.get::<StripePrice>(
            &format!("/v1/prices/{}", price_id),
            &format!("Price {}", price_id),
        )
        .await
        .map(GatewayPrice::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::webhook_types::hex_encode;
    use crate::domain::webhook::GatewayEventKind;

    const SECRET: &str = "whsec_test_secret";

    fn gateway() -> StripeGateway {
        StripeGateway::new(StripeConfig::new("sk_test_key", SECRET))
    }

    fn create_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
        let signed_payload = format!("{}.{}", timestamp, payload);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        let result = mac.finalize().into_bytes();

        format!("t={},v1={}", timestamp, hex_encode(&result))
    }

    fn checkout_payload(livemode: bool) -> String {
        format!(
            r#"{{
                "id": "evt_test",
                "type": "checkout.session.completed",
                "created": 1704067200,
                "livemode": {},
                "data": {{"object": {{
                    "id": "cs_test",
                    "mode": "payment",
                    "customer": "cus_1",
                    "metadata": {{"internal_payment_id": "8d5a0c1e-2f3b-4a5c-9d6e-7f8091a2b3c4"}}
                }}}}
            }}"#,
            livemode
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("api_key", "webhook_secret");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert!(!config.require_livemode);
    }

    #[test]
    fn config_with_base_url_trims_trailing_slash() {
        let config = StripeConfig::new("key", "secret").with_base_url("http://localhost:8080/");
        assert_eq!(config.api_base_url, "http://localhost:8080");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature Verification Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn verify_signature_valid() {
        let payload = r#"{"id":"evt_test"}"#;
        let signature = create_test_signature(SECRET, chrono::Utc::now().timestamp(), payload);
        let header = SignatureHeader::parse(&signature).unwrap();

        assert!(gateway().verify_signature(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn verify_signature_wrong_secret() {
        let payload = r#"{"id":"evt_test"}"#;
        let signature =
            create_test_signature("whsec_other", chrono::Utc::now().timestamp(), payload);
        let header = SignatureHeader::parse(&signature).unwrap();

        assert_eq!(
            gateway().verify_signature(payload.as_bytes(), &header),
            Err(VerificationError::SignatureMismatch)
        );
    }

    #[test]
    fn verify_signature_tampered_body() {
        let signature =
            create_test_signature(SECRET, chrono::Utc::now().timestamp(), r#"{"amount":1}"#);
        let header = SignatureHeader::parse(&signature).unwrap();

        assert_eq!(
            gateway().verify_signature(br#"{"amount":1000}"#, &header),
            Err(VerificationError::SignatureMismatch)
        );
    }

    #[test]
    fn verify_signature_accepts_any_matching_v1() {
        let payload = r#"{"id":"evt_test"}"#;
        let now = chrono::Utc::now().timestamp();
        let valid = create_test_signature(SECRET, now, payload);
        let header = format!("t={},v1={},{}", now, "00".repeat(32), valid.split(',').nth(1).unwrap());
        let header = SignatureHeader::parse(&header).unwrap();

        assert!(gateway().verify_signature(payload.as_bytes(), &header).is_ok());
    }

    #[test]
    fn verify_signature_expired_timestamp() {
        let payload = r#"{"id":"evt_test"}"#;
        let old = chrono::Utc::now().timestamp() - 400;
        let header = SignatureHeader::parse(&create_test_signature(SECRET, old, payload)).unwrap();

        assert!(matches!(
            gateway().verify_signature(payload.as_bytes(), &header),
            Err(VerificationError::TimestampOutOfTolerance { .. })
        ));
    }

    #[test]
    fn verify_signature_future_timestamp() {
        let payload = r#"{"id":"evt_test"}"#;
        let future = chrono::Utc::now().timestamp() + 120;
        let header =
            SignatureHeader::parse(&create_test_signature(SECRET, future, payload)).unwrap();

        assert!(matches!(
            gateway().verify_signature(payload.as_bytes(), &header),
            Err(VerificationError::TimestampOutOfTolerance { .. })
        ));
    }

    #[test]
    fn verify_signature_small_future_tolerance() {
        let payload = r#"{"id":"evt_test"}"#;
        let slightly_ahead = chrono::Utc::now().timestamp() + 30;
        let header =
            SignatureHeader::parse(&create_test_signature(SECRET, slightly_ahead, payload))
                .unwrap();

        assert!(gateway().verify_signature(payload.as_bytes(), &header).is_ok());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // verify_and_parse Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn verify_and_parse_valid_event() {
        let payload = checkout_payload(false);
        let signature = create_test_signature(SECRET, chrono::Utc::now().timestamp(), &payload);

        let event = gateway()
            .verify_and_parse(payload.as_bytes(), Some(&signature))
            .await
            .unwrap();

        assert_eq!(event.event_type, "checkout.session.completed");
        assert!(matches!(event.kind, GatewayEventKind::CheckoutCompleted(_)));
    }

    #[tokio::test]
    async fn verify_and_parse_requires_signature() {
        let payload = checkout_payload(false);

        let result = gateway().verify_and_parse(payload.as_bytes(), None).await;

        assert_eq!(result.unwrap_err(), VerificationError::MissingSignature);
    }

    #[tokio::test]
    async fn verify_and_parse_rejects_malformed_header() {
        let payload = checkout_payload(false);

        let result = gateway()
            .verify_and_parse(payload.as_bytes(), Some("garbage"))
            .await;

        assert!(matches!(result, Err(VerificationError::MalformedSignature(_))));
    }

    #[tokio::test]
    async fn verify_and_parse_rejects_test_mode_when_livemode_required() {
        let gateway =
            StripeGateway::new(StripeConfig::new("sk_live", SECRET).with_require_livemode(true));
        let payload = checkout_payload(false);
        let signature = create_test_signature(SECRET, chrono::Utc::now().timestamp(), &payload);

        let result = gateway.verify_and_parse(payload.as_bytes(), Some(&signature)).await;

        assert_eq!(result.unwrap_err(), VerificationError::LivemodeMismatch);
    }

    #[tokio::test]
    async fn verify_and_parse_rejects_signed_garbage() {
        let payload = "not json";
        let signature = create_test_signature(SECRET, chrono::Utc::now().timestamp(), payload);

        let result = gateway().verify_and_parse(payload.as_bytes(), Some(&signature)).await;

        assert!(matches!(result, Err(VerificationError::InvalidPayload(_))));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // API Error Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn api_error_reads_stripe_error_body() {
        let err = api_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error": {"code": "resource_missing", "message": "No such price"}}"#,
        );

        assert_eq!(err.code, PaymentErrorCode::ProviderError);
        assert_eq!(err.provider_code.as_deref(), Some("resource_missing"));
        assert!(err.message.contains("No such price"));
    }

    #[test]
    fn api_error_classifies_status() {
        assert_eq!(
            api_error(reqwest::StatusCode::UNAUTHORIZED, "").code,
            PaymentErrorCode::AuthenticationError
        );
        assert!(api_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "").retryable);
    }
}

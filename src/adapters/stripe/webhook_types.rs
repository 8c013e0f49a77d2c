//! Stripe-specific types for webhook handling.
//!
//! These types represent Stripe API objects as they arrive in webhook
//! payloads and REST responses, and map them onto the gateway-agnostic
//! domain types handlers work with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::subscription::SubscriptionStatus;
use crate::domain::webhook::{
    CheckoutMode, CheckoutSession, GatewayEventKind, GatewayPrice, GatewayProduct,
    GatewaySubscription, Invoice, RecurringInterval, VerificationError, WebhookEvent,
};

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureParseError {
    #[error("Missing Stripe-Signature header")]
    MissingHeader,
    #[error("Missing timestamp (t=) in signature")]
    MissingTimestamp,
    #[error("Missing v1 signature in header")]
    MissingV1Signature,
    #[error("Invalid timestamp format")]
    InvalidTimestamp,
    #[error("Invalid signature format (not valid hex)")]
    InvalidSignatureFormat,
}

impl From<SignatureParseError> for VerificationError {
    fn from(err: SignatureParseError) -> Self {
        match err {
            SignatureParseError::MissingHeader => VerificationError::MissingSignature,
            other => VerificationError::MalformedSignature(other.to_string()),
        }
    }
}

/// Parsed Stripe-Signature header: `t=timestamp,v1=signature[,v1=...]`.
///
/// Stripe sends several `v1` entries while a signing secret is being
/// rolled; any one of them may match.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the payload.
    pub timestamp: i64,

    /// HMAC-SHA256 signatures, hex-decoded.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signatures.push(
                        hex_decode(value.trim()).ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Encode bytes to a lowercase hex string.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event as received from the API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,

    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,

    /// Previous values for updated fields (on update events).
    pub previous_attributes: Option<serde_json::Value>,
}

/// A reference that Stripe either leaves as an id or expands to an object.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StripeExpandable {
    Id(String),
    Object(StripeObjectRef),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeObjectRef {
    pub id: String,
}

impl StripeExpandable {
    pub fn id(&self) -> &str {
        match self {
            StripeExpandable::Id(id) => id,
            StripeExpandable::Object(object) => &object.id,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    pub customer: Option<StripeExpandable>,

    pub subscription: Option<StripeExpandable>,

    /// Payment mode (payment, setup, subscription).
    pub mode: String,

    pub payment_status: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Subscription object.
///
/// Newer API versions report the billing period on each item instead of
/// the subscription; both shapes are accepted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    pub customer: StripeExpandable,

    pub status: String,

    pub current_period_start: Option<i64>,

    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

/// Stripe list container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscriptionItem {
    pub id: String,

    pub price: StripePrice,

    pub current_period_start: Option<i64>,

    pub current_period_end: Option<i64>,
}

/// Stripe Price object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePrice {
    /// Price ID (price_...).
    pub id: String,

    pub product: StripeExpandable,

    #[serde(default = "default_true")]
    pub active: bool,

    /// Unit amount in minor units.
    pub unit_amount: Option<i64>,

    pub currency: Option<String>,

    pub recurring: Option<StripePriceRecurring>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,

    #[serde(default = "default_interval_count")]
    pub interval_count: i32,
}

fn default_true() -> bool {
    true
}

fn default_interval_count() -> i32 {
    1
}

/// Stripe Product object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeProduct {
    /// Product ID (prod_...).
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub description: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    pub default_price: Option<StripeExpandable>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: Option<StripeExpandable>,

    pub subscription: Option<StripeExpandable>,

    #[serde(default)]
    pub amount_paid: i64,

    pub currency: Option<String>,

    /// Number of payment attempts made.
    #[serde(default)]
    pub attempt_count: i32,

    /// subscription_create, subscription_cycle, manual, ...
    #[serde(default)]
    pub billing_reason: Option<String>,

    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLineItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoiceLineItem {
    pub id: String,

    pub price: Option<StripeLinePrice>,
}

/// Price reference on an invoice line; only the id is needed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeLinePrice {
    pub id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Mapping to Domain Types
// ════════════════════════════════════════════════════════════════════════════════

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

impl From<StripeCheckoutSession> for CheckoutSession {
    fn from(session: StripeCheckoutSession) -> Self {
        Self {
            id: session.id,
            mode: CheckoutMode::from(session.mode.as_str()),
            customer_id: session.customer.map(|c| c.id().to_string()),
            subscription_id: session.subscription.map(|s| s.id().to_string()),
            metadata: session.metadata,
        }
    }
}

impl From<StripeSubscription> for GatewaySubscription {
    fn from(sub: StripeSubscription) -> Self {
        let first_item = sub.items.data.first();
        let period_start = sub
            .current_period_start
            .or_else(|| first_item.and_then(|i| i.current_period_start));
        let period_end = sub
            .current_period_end
            .or_else(|| first_item.and_then(|i| i.current_period_end));

        Self {
            customer_id: sub.customer.id().to_string(),
            status: SubscriptionStatus::from(sub.status.as_str()),
            current_period_start: timestamp(period_start),
            current_period_end: timestamp(period_end),
            cancel_at_period_end: sub.cancel_at_period_end,
            price_ids: sub.items.data.iter().map(|i| i.price.id.clone()).collect(),
            metadata: sub.metadata,
            id: sub.id,
        }
    }
}

impl From<StripeProduct> for GatewayProduct {
    fn from(product: StripeProduct) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            active: product.active,
            default_price_id: product.default_price.map(|p| p.id().to_string()),
            metadata: product.metadata,
        }
    }
}

impl From<StripePrice> for GatewayPrice {
    fn from(price: StripePrice) -> Self {
        Self {
            product_id: price.product.id().to_string(),
            id: price.id,
            active: price.active,
            unit_amount: price.unit_amount,
            currency: price.currency,
            recurring: price.recurring.map(|r| RecurringInterval {
                interval: r.interval,
                interval_count: r.interval_count,
            }),
            metadata: price.metadata,
        }
    }
}

impl From<StripeInvoice> for Invoice {
    fn from(invoice: StripeInvoice) -> Self {
        Self {
            id: invoice.id,
            customer_id: invoice.customer.map(|c| c.id().to_string()),
            subscription_id: invoice.subscription.map(|s| s.id().to_string()),
            attempt_count: invoice.attempt_count,
            amount_paid: invoice.amount_paid,
            currency: invoice.currency,
            billing_reason: invoice.billing_reason,
            line_price_ids: invoice
                .lines
                .data
                .into_iter()
                .filter_map(|line| line.price.map(|p| p.id))
                .collect(),
        }
    }
}

fn object<T, D>(event: &StripeWebhookEvent) -> Result<D, VerificationError>
where
    T: serde::de::DeserializeOwned,
    D: From<T>,
{
    serde_json::from_value::<T>(event.data.object.clone())
        .map(D::from)
        .map_err(|e| {
            VerificationError::InvalidPayload(format!("{} object: {}", event.event_type, e))
        })
}

impl StripeWebhookEvent {
    /// Maps the event onto the closed set of kinds the core handles.
    pub fn kind(&self) -> Result<GatewayEventKind, VerificationError> {
        use GatewayEventKind as Kind;

        let kind = match self.event_type.as_str() {
            "checkout.session.completed" => {
                Kind::CheckoutCompleted(object::<StripeCheckoutSession, _>(self)?)
            }
            "invoice.payment_succeeded" => {
                Kind::InvoicePaymentSucceeded(object::<StripeInvoice, _>(self)?)
            }
            "invoice.payment_failed" => Kind::InvoicePaymentFailed(object::<StripeInvoice, _>(self)?),
            "customer.subscription.created" => {
                Kind::SubscriptionCreated(object::<StripeSubscription, _>(self)?)
            }
            "customer.subscription.updated" => {
                Kind::SubscriptionUpdated(object::<StripeSubscription, _>(self)?)
            }
            "customer.subscription.deleted" => {
                Kind::SubscriptionDeleted(object::<StripeSubscription, _>(self)?)
            }
            "product.created" => Kind::ProductCreated(object::<StripeProduct, _>(self)?),
            "product.updated" => Kind::ProductUpdated(object::<StripeProduct, _>(self)?),
            "product.deleted" => Kind::ProductDeleted(object::<StripeProduct, _>(self)?),
            "price.created" => Kind::PriceCreated(object::<StripePrice, _>(self)?),
            "price.updated" => Kind::PriceUpdated(object::<StripePrice, _>(self)?),
            "price.deleted" => Kind::PriceDeleted(object::<StripePrice, _>(self)?),
            _ => Kind::Unknown,
        };
        Ok(kind)
    }
}

/// Parses a raw Stripe webhook body into a domain event.
///
/// Performs no signature check; callers verify first.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, VerificationError> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| VerificationError::InvalidPayload(format!("Invalid JSON: {}", e)))?;
    let kind = event.kind()?;

    Ok(WebhookEvent {
        id: event.id,
        event_type: event.event_type,
        created: event.created,
        livemode: event.livemode,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════════════
    // SignatureHeader Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn parse_signature_header_valid() {
        let parsed = SignatureHeader::parse("t=1704067200,v1=5d41402abc4b2a76b9719d911017c592").unwrap();

        assert_eq!(parsed.timestamp, 1704067200);
        assert_eq!(hex_encode(&parsed.v1_signatures[0]), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn parse_signature_header_collects_rolled_secrets() {
        let parsed = SignatureHeader::parse("t=1,v1=aabb,v1=ccdd,v0=eeff").unwrap();
        assert_eq!(parsed.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_signature_header_missing_parts() {
        assert_eq!(
            SignatureHeader::parse("v1=aabb").unwrap_err(),
            SignatureParseError::MissingTimestamp
        );
        assert_eq!(
            SignatureHeader::parse("t=1704067200,v0=aabbccdd").unwrap_err(),
            SignatureParseError::MissingV1Signature
        );
        assert_eq!(SignatureHeader::parse(" ").unwrap_err(), SignatureParseError::MissingHeader);
    }

    #[test]
    fn parse_signature_header_rejects_bad_values() {
        assert_eq!(
            SignatureHeader::parse("t=soon,v1=aabb").unwrap_err(),
            SignatureParseError::InvalidTimestamp
        );
        assert_eq!(
            SignatureHeader::parse("t=1,v1=abc").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
        assert_eq!(
            SignatureHeader::parse("t=1,v1=zz").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
    }

    #[test]
    fn missing_header_maps_to_missing_signature() {
        let err: VerificationError = SignatureParseError::MissingHeader.into();
        assert_eq!(err, VerificationError::MissingSignature);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn checkout_completed_maps_session() {
        let payload = br#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "cs_test_abc",
                    "object": "checkout.session",
                    "customer": "cus_1",
                    "subscription": null,
                    "mode": "payment",
                    "payment_status": "paid",
                    "metadata": {"internal_payment_id": "6a3c5f8e-1a2b-4c3d-8e9f-0a1b2c3d4e5f"}
                }
            }
        }"#;

        let event = parse_event(payload).unwrap();

        assert_eq!(event.id, "evt_1");
        let GatewayEventKind::CheckoutCompleted(session) = event.kind else {
            panic!("expected checkout event");
        };
        assert_eq!(session.mode, CheckoutMode::Payment);
        assert_eq!(session.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(
            session.internal_payment_id(),
            Some("6a3c5f8e-1a2b-4c3d-8e9f-0a1b2c3d4e5f")
        );
    }

    #[test]
    fn subscription_period_falls_back_to_first_item() {
        let sub: StripeSubscription = serde_json::from_str(
            r#"{
                "id": "sub_1",
                "customer": {"id": "cus_1", "object": "customer"},
                "status": "past_due",
                "items": {"data": [{
                    "id": "si_1",
                    "current_period_start": 1704067200,
                    "current_period_end": 1706745600,
                    "price": {"id": "price_monthly", "product": "prod_1", "recurring": {"interval": "month"}}
                }]}
            }"#,
        )
        .unwrap();

        let sub = GatewaySubscription::from(sub);

        assert_eq!(sub.customer_id, "cus_1");
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        assert_eq!(sub.primary_price_id(), Some("price_monthly"));
        assert_eq!(sub.current_period_end.map(|t| t.timestamp()), Some(1706745600));
    }

    #[test]
    fn invoice_collects_line_prices() {
        let invoice: StripeInvoice = serde_json::from_str(
            r#"{
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "amount_paid": 1999,
                "currency": "usd",
                "attempt_count": 2,
                "billing_reason": "subscription_create",
                "lines": {"data": [
                    {"id": "il_1", "price": {"id": "price_monthly"}},
                    {"id": "il_2", "price": null}
                ]}
            }"#,
        )
        .unwrap();

        let invoice = Invoice::from(invoice);

        assert_eq!(invoice.line_price_ids, vec!["price_monthly"]);
        assert_eq!(invoice.failed_attempt_key(), "in_1:attempt:2");
        assert!(invoice.opens_subscription());
    }

    #[test]
    fn price_maps_recurring_and_product() {
        let price: StripePrice = serde_json::from_str(
            r#"{"id": "price_1", "product": "prod_1", "active": false, "unit_amount": 500,
                "currency": "usd", "metadata": {"tokens_to_award": "50"}}"#,
        )
        .unwrap();

        let price = GatewayPrice::from(price);

        assert_eq!(price.product_id, "prod_1");
        assert!(!price.active);
        assert!(!price.is_recurring());
    }

    #[test]
    fn unknown_event_types_map_to_unknown() {
        let payload = br#"{"id": "evt_2", "type": "charge.refunded", "created": 1, "data": {"object": {}}}"#;
        assert_eq!(parse_event(payload).unwrap().kind, GatewayEventKind::Unknown);
    }

    #[test]
    fn malformed_known_object_is_invalid_payload() {
        let payload = br#"{"id": "evt_3", "type": "price.deleted", "created": 1, "data": {"object": {"id": 5}}}"#;
        assert!(matches!(
            parse_event(payload),
            Err(VerificationError::InvalidPayload(_))
        ));
    }

    #[test]
    fn non_json_body_is_invalid_payload() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(VerificationError::InvalidPayload(_))
        ));
    }
}

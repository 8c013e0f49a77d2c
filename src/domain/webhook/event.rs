//! Verified webhook events.
//!
//! Gateway events are a closed set of known kinds plus `Unknown`. Handlers
//! are selected by exhaustive match on [`GatewayEventKind`], never by
//! comparing type strings.

use std::collections::HashMap;

use super::{GatewayPrice, GatewayProduct, GatewaySubscription};

/// Checkout metadata key holding the internal payment transaction id.
pub const INTERNAL_PAYMENT_ID_KEY: &str = "internal_payment_id";

/// Checkout metadata key holding the internal plan id.
pub const PLAN_ID_KEY: &str = "plan_id";

/// Billing reason of the invoice that opens a subscription.
pub const SUBSCRIPTION_CREATE_REASON: &str = "subscription_create";

/// A verified, parsed webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    /// Gateway event id (e.g. `evt_...`).
    pub id: String,
    /// Gateway type string, kept for logging.
    pub event_type: String,
    /// Unix timestamp at which the gateway created the event.
    pub created: i64,
    pub livemode: bool,
    pub kind: GatewayEventKind,
}

/// The event kinds the core reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEventKind {
    CheckoutCompleted(CheckoutSession),
    InvoicePaymentSucceeded(Invoice),
    InvoicePaymentFailed(Invoice),
    SubscriptionCreated(GatewaySubscription),
    SubscriptionUpdated(GatewaySubscription),
    SubscriptionDeleted(GatewaySubscription),
    ProductCreated(GatewayProduct),
    ProductUpdated(GatewayProduct),
    ProductDeleted(GatewayProduct),
    PriceCreated(GatewayPrice),
    PriceUpdated(GatewayPrice),
    PriceDeleted(GatewayPrice),
    /// A valid event of a type this core does not handle.
    Unknown,
}

/// Checkout mode of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
    Other(String),
}

impl From<&str> for CheckoutMode {
    fn from(value: &str) -> Self {
        match value {
            "payment" => CheckoutMode::Payment,
            "subscription" => CheckoutMode::Subscription,
            other => CheckoutMode::Other(other.to_string()),
        }
    }
}

/// A completed checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: CheckoutMode,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// Internal payment transaction id carried in session metadata.
    pub fn internal_payment_id(&self) -> Option<&str> {
        self.metadata_value(INTERNAL_PAYMENT_ID_KEY)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// An invoice payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub attempt_count: i32,
    pub amount_paid: i64,
    pub currency: Option<String>,
    /// Why the gateway issued the invoice (`subscription_create`,
    /// `subscription_cycle`, ...).
    pub billing_reason: Option<String>,
    /// Price ids of the invoice lines, in gateway order.
    pub line_price_ids: Vec<String>,
}

impl Invoice {
    /// First invoice of a new subscription. Its payment is the checkout
    /// itself, which already carries the ledger entry and the credit.
    pub fn opens_subscription(&self) -> bool {
        self.billing_reason.as_deref() == Some(SUBSCRIPTION_CREATE_REASON)
    }

    pub fn first_line_price_id(&self) -> Option<&str> {
        self.line_price_ids.first().map(String::as_str)
    }

    /// Ledger key for one failed attempt on this invoice.
    ///
    /// Redelivery of the same failure maps to the same key; a later
    /// successful payment is keyed by the bare invoice id.
    pub fn failed_attempt_key(&self) -> String {
        format!("{}:attempt:{}", self.id, self.attempt_count)
    }
}

//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe, including:
//! - Webhook signature verification
//! - Event parsing into gateway-agnostic domain events
//! - Subscription, product, and price lookups
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod mock_gateway;
mod stripe_gateway;
mod webhook_types;

pub use mock_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_gateway::{StripeConfig, StripeGateway, STRIPE_GATEWAY_NAME, STRIPE_SIGNATURE_HEADER};
pub use webhook_types::{
    hex_encode, parse_event, SignatureHeader, SignatureParseError, StripeCheckoutSession,
    StripeInvoice, StripePrice, StripeProduct, StripeSubscription, StripeWebhookEvent,
};

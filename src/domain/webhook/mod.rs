//! Webhook module - verified gateway events and their outcomes.

mod confirmation;
mod errors;
mod event;
mod gateway_objects;

pub use confirmation::{WebhookConfirmation, WebhookOutcome};
pub use errors::{VerificationError, WebhookError};
pub use event::{
    CheckoutMode, CheckoutSession, GatewayEventKind, Invoice, WebhookEvent,
    INTERNAL_PAYMENT_ID_KEY, PLAN_ID_KEY,
};
pub use gateway_objects::{GatewayPrice, GatewayProduct, GatewaySubscription, RecurringInterval};

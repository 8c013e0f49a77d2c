//! Webhook handlers - one file per event family.
//!
//! `process_webhook` verifies and dispatches; the other files add the
//! per-event handlers to `GatewayWebhookHandler`.

mod catalog_events;
mod checkout_completed;
mod invoice_failed;
mod invoice_succeeded;
mod process_webhook;
mod subscription_lifecycle;

#[cfg(test)]
mod test_support;

pub use process_webhook::{GatewayWebhookHandler, ProcessWebhookCommand};

//! Application handlers.
//!
//! Command handlers that orchestrate domain services for one use case.

pub mod webhook;

pub use webhook::{GatewayWebhookHandler, ProcessWebhookCommand};

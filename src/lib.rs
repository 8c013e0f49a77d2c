//! Payment Webhooks - idempotent ingestion of payment-gateway events
//!
//! Verifies signed gateway webhooks and applies them to a payment ledger,
//! an external token wallet, user subscriptions, and a mirrored plan
//! catalog. Every handler is safe to run again for a redelivered event.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

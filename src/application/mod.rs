//! Application layer - Services and Handlers.
//!
//! Services own the writes to one table each; handlers coordinate them for
//! a single incoming gateway event.

pub mod handlers;
pub mod services;

pub use handlers::{GatewayWebhookHandler, ProcessWebhookCommand};
pub use services::{
    CatalogSyncService, EnsuredTransaction, LedgerService, StatusChange, SubscriptionSyncService,
};

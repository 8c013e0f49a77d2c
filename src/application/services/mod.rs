//! Application services owning writes to one table each.
//!
//! - `LedgerService` - `payment_transactions` and wallet crediting
//! - `CatalogSyncService` - `subscription_plans`
//! - `SubscriptionSyncService` - `user_subscriptions`

mod catalog_sync;
mod ledger_service;
mod subscription_sync;

pub use catalog_sync::CatalogSyncService;
pub use ledger_service::{EnsuredTransaction, LedgerService, StatusChange};
pub use subscription_sync::SubscriptionSyncService;

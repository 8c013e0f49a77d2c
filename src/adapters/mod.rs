//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum webhook ingress
//! - `memory` - In-memory record store and token wallet
//! - `postgres` - `RecordStore` over PostgreSQL
//! - `stripe` - Stripe webhook verification and REST lookups
//! - `wallet` - HTTP client for the token wallet service

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
pub mod wallet;

pub use memory::{InMemoryRecordStore, InMemoryTokenWallet};
pub use postgres::PostgresRecordStore;
pub use stripe::{MockPaymentGateway, StripeConfig, StripeGateway};
pub use wallet::{HttpTokenWalletService, WalletServiceConfig};

//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `RecordStore` - Generic row persistence (find/insert/update/upsert)
//! - `PaymentGateway` - Webhook verification and gateway object lookups
//! - `TokenWalletService` - External token wallet crediting

mod payment_gateway;
mod record_store;
mod token_wallet;

pub use payment_gateway::{PaymentError, PaymentErrorCode, PaymentGateway};
pub use record_store::{
    from_record, to_record, Conflict, ConflictAction, Filter, FilterOp, Record, RecordStore, Table,
};
pub use token_wallet::{TokenWalletService, WalletTransactionReceipt};

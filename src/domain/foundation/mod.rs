//! Foundation module - Shared domain primitives.
//!
//! Identifiers and error types shared by the ledger, catalog and
//! subscription modules.

mod errors;
mod ids;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{PaymentTransactionId, PlanId, UserId, WalletId};

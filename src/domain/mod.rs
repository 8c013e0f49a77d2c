//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, errors)
//! - `ledger` - Payment transactions, their state machine, and wallet credits
//! - `catalog` - Plans mirrored from gateway products and prices
//! - `subscription` - User subscription lifecycle state
//! - `webhook` - Verified gateway events, outcomes, and the error taxonomy

pub mod catalog;
pub mod foundation;
pub mod ledger;
pub mod subscription;
pub mod webhook;

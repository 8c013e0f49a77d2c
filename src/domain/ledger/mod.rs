//! Ledger module - payment transactions and wallet credits.

mod credit;
mod status;
mod transaction;

pub use credit::{CreditType, TokenWalletCredit, PAYMENT_TRANSACTION_ENTITY};
pub use status::PaymentStatus;
pub use transaction::{NewPaymentTransaction, PaymentTransaction};

//! Token wallet service adapters.

mod http_token_wallet;

pub use http_token_wallet::{HttpTokenWalletService, WalletServiceConfig};

//! In-memory adapters for tests and local runs.

mod in_memory_record_store;
mod in_memory_token_wallet;

pub use in_memory_record_store::InMemoryRecordStore;
pub use in_memory_token_wallet::InMemoryTokenWallet;

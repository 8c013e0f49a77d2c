//! PostgreSQL adapters.
//!
//! - `PostgresRecordStore` - `RecordStore` over sqlx with JSONB row mapping

mod record_store;

pub use record_store::PostgresRecordStore;

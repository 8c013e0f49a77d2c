//! RecordStore port - narrow CRUD/filter contract over the relational store.
//!
//! Rows travel as JSON objects keyed by column name. The core never builds
//! SQL; adapters translate [`Filter`] and [`Conflict`] into their own query
//! language and enforce the unique keys listed by [`Table::unique_keys`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode};

/// One row, keyed by column name.
pub type Record = Map<String, Value>;

/// Tables the core reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    PaymentTransactions,
    UserSubscriptions,
    SubscriptionPlans,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::PaymentTransactions => "payment_transactions",
            Table::UserSubscriptions => "user_subscriptions",
            Table::SubscriptionPlans => "subscription_plans",
        }
    }

    /// Unique constraints on the table, each a set of columns.
    ///
    /// A constraint only applies when every column in it is non-null.
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            Table::PaymentTransactions => &[&["gateway_name", "gateway_transaction_id"]],
            Table::UserSubscriptions => &[&["gateway_subscription_id"]],
            Table::SubscriptionPlans => &[&["gateway_price_id"]],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq,
    NotEq,
    /// Value must be a JSON array; matches any element.
    In,
}

/// A column predicate. Filters passed together are AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::NotEq,
            value: value.into(),
        }
    }

    pub fn in_list<V: Into<Value>>(column: impl Into<String>, values: Vec<V>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::In,
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Evaluates the predicate against a row. A missing column reads as null.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.column).unwrap_or(&Value::Null);
        match &self.op {
            FilterOp::Eq => actual == &self.value,
            FilterOp::NotEq => actual != &self.value,
            FilterOp::In => match &self.value {
                Value::Array(candidates) => candidates.contains(actual),
                _ => false,
            },
        }
    }
}

/// What to do when an upserted row collides with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Overwrite the provided columns of the existing row.
    Update,
    /// Keep the existing row; it is not returned.
    Ignore,
}

/// Conflict target and action for an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub columns: Vec<String>,
    pub action: ConflictAction,
}

impl Conflict {
    pub fn update_on(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            action: ConflictAction::Update,
        }
    }

    pub fn ignore_on(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            action: ConflictAction::Ignore,
        }
    }
}

/// Port for generic record persistence.
///
/// Every method returns the rows as they stand after the operation,
/// including store-generated columns (`id`, timestamps).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching all filters.
    async fn find(&self, table: Table, filters: &[Filter]) -> Result<Vec<Record>, DomainError>;

    /// Inserts rows. A unique-key collision fails with `ErrorCode::Conflict`.
    async fn insert(&self, table: Table, rows: Vec<Record>) -> Result<Vec<Record>, DomainError>;

    /// Applies `changes` to every row matching all filters.
    async fn update(
        &self,
        table: Table,
        changes: Record,
        filters: &[Filter],
    ) -> Result<Vec<Record>, DomainError>;

    /// Inserts rows, resolving collisions on `conflict.columns` atomically.
    ///
    /// With [`ConflictAction::Ignore`] only newly inserted rows are returned.
    async fn upsert(
        &self,
        table: Table,
        rows: Vec<Record>,
        conflict: Conflict,
    ) -> Result<Vec<Record>, DomainError>;
}

/// Serializes a value into a row.
pub fn to_record<T: Serialize>(value: &T) -> Result<Record, DomainError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::new(
            ErrorCode::SerializationError,
            format!("Expected a JSON object for a record, got {}", other),
        )),
    }
}

/// Deserializes a row into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, DomainError> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows must be objects"),
        }
    }

    #[test]
    fn record_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn RecordStore) {}
    }

    #[test]
    fn eq_filter_treats_missing_column_as_null() {
        let record = row(json!({"status": "PENDING"}));
        assert!(Filter::eq("status", "PENDING").matches(&record));
        assert!(Filter::eq("organization_id", Value::Null).matches(&record));
        assert!(!Filter::eq("status", "COMPLETED").matches(&record));
    }

    #[test]
    fn not_eq_and_in_filters() {
        let record = row(json!({"gateway_price_id": "price_FREE"}));
        assert!(!Filter::not_eq("gateway_price_id", "price_FREE").matches(&record));
        assert!(Filter::in_list("gateway_price_id", vec!["price_1", "price_FREE"]).matches(&record));
        assert!(!Filter::in_list("gateway_price_id", vec!["price_1"]).matches(&record));
    }

    #[test]
    fn to_record_rejects_non_objects() {
        let err = to_record(&42).unwrap_err();
        assert_eq!(err.code, ErrorCode::SerializationError);
    }

    #[test]
    fn unique_keys_cover_idempotency_columns() {
        let keys = Table::PaymentTransactions.unique_keys();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].to_vec(), vec!["gateway_name", "gateway_transaction_id"]);
        assert_eq!(Table::SubscriptionPlans.to_string(), "subscription_plans");
    }
}

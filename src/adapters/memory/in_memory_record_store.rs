//! In-memory implementation of the RecordStore port.
//!
//! Enforces the same unique keys as the PostgreSQL schema, generates `id`
//! and timestamp columns, and supports write-failure injection for tests.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Conflict, ConflictAction, Filter, Record, RecordStore, Table};

/// RecordStore backed by process memory.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryRecordStore::new();
/// store.seed(Table::PaymentTransactions, row);
///
/// // ... exercise handlers ...
///
/// assert_eq!(store.mutation_count(), 1);
/// ```
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<Table, Vec<Record>>>,
    failing_tables: RwLock<HashSet<Table>>,
    mutations: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Inserts a row directly, bypassing failure injection and the mutation counter.
    pub fn seed(&self, table: Table, row: Record) -> Record {
        let row = prepare_insert(table, row);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table)
            .or_default()
            .push(row.clone());
        row
    }

    /// Snapshot of every row in a table.
    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of write calls that changed at least one row.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write to `table` fail with a database error.
    pub fn fail_writes_to(&self, table: Table) {
        self.failing_tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table);
    }

    pub fn restore_writes_to(&self, table: Table) {
        self.failing_tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&table);
    }

    fn check_writable(&self, table: Table) -> Result<(), DomainError> {
        let failing = self
            .failing_tables
            .read()
            .map_err(|_| lock_error())?
            .contains(&table);
        if failing {
            return Err(DomainError::database(format!(
                "Simulated write failure on {}",
                table
            )));
        }
        Ok(())
    }

    fn record_mutation(&self, affected: usize) {
        if affected > 0 {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find(&self, table: Table, filters: &[Filter]) -> Result<Vec<Record>, DomainError> {
        let tables = self.tables.read().map_err(|_| lock_error())?;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, rows: Vec<Record>) -> Result<Vec<Record>, DomainError> {
        self.check_writable(table)?;
        let mut tables = self.tables.write().map_err(|_| lock_error())?;
        let existing = tables.entry(table).or_default();

        let mut staged: Vec<Record> = Vec::with_capacity(rows.len());
        for row in rows {
            let row = prepare_insert(table, row);
            if let Some(key) = violated_key(table, &row, existing.iter().chain(staged.iter())) {
                return Err(unique_violation(table, key));
            }
            staged.push(row);
        }

        existing.extend(staged.iter().cloned());
        drop(tables);
        self.record_mutation(staged.len());
        Ok(staged)
    }

    async fn update(
        &self,
        table: Table,
        changes: Record,
        filters: &[Filter],
    ) -> Result<Vec<Record>, DomainError> {
        self.check_writable(table)?;
        let mut tables = self.tables.write().map_err(|_| lock_error())?;
        let rows = tables.entry(table).or_default();

        let mut next = rows.clone();
        let mut touched = Vec::new();
        for (index, row) in next.iter_mut().enumerate() {
            if filters.iter().all(|f| f.matches(row)) {
                apply_changes(row, &changes);
                touched.push(index);
            }
        }

        for &index in &touched {
            let others = next
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, r)| r);
            if let Some(key) = violated_key(table, &next[index], others) {
                return Err(unique_violation(table, key));
            }
        }

        let updated: Vec<Record> = touched.iter().map(|&i| next[i].clone()).collect();
        *rows = next;
        drop(tables);
        self.record_mutation(updated.len());
        Ok(updated)
    }

    async fn upsert(
        &self,
        table: Table,
        rows: Vec<Record>,
        conflict: Conflict,
    ) -> Result<Vec<Record>, DomainError> {
        self.check_writable(table)?;
        let mut tables = self.tables.write().map_err(|_| lock_error())?;
        let existing = tables.entry(table).or_default();

        let mut written = Vec::new();
        for row in rows {
            let target = existing
                .iter()
                .position(|current| same_key(&conflict.columns, current, &row));

            match (target, conflict.action) {
                (Some(index), ConflictAction::Update) => {
                    apply_changes(&mut existing[index], &row);
                    written.push(existing[index].clone());
                }
                (Some(_), ConflictAction::Ignore) => {}
                (None, _) => {
                    let row = prepare_insert(table, row);
                    if let Some(key) = violated_key(table, &row, existing.iter()) {
                        return Err(unique_violation(table, key));
                    }
                    existing.push(row.clone());
                    written.push(row);
                }
            }
        }

        drop(tables);
        self.record_mutation(written.len());
        Ok(written)
    }
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn lock_error() -> DomainError {
    DomainError::new(ErrorCode::InternalError, "In-memory record store lock poisoned")
}

fn unique_violation(table: Table, key: &[&str]) -> DomainError {
    DomainError::conflict(
        table.as_str(),
        format!("Duplicate key on {} ({})", table, key.join(", ")),
    )
}

/// Fills store-generated columns the way the database defaults would.
fn prepare_insert(table: Table, mut row: Record) -> Record {
    if row.get("id").map_or(true, Value::is_null) {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if table == Table::PaymentTransactions && row.get("created_at").map_or(true, Value::is_null) {
        row.insert("created_at".to_string(), now_value());
    }
    row.insert("updated_at".to_string(), now_value());
    row
}

fn apply_changes(row: &mut Record, changes: &Record) {
    for (column, value) in changes {
        if column != "id" {
            row.insert(column.clone(), value.clone());
        }
    }
    row.insert("updated_at".to_string(), now_value());
}

/// True when both rows carry equal, non-null values for every column.
fn same_key(columns: &[String], a: &Record, b: &Record) -> bool {
    !columns.is_empty()
        && columns.iter().all(|column| match (a.get(column), b.get(column)) {
            (Some(left), Some(right)) => !left.is_null() && left == right,
            _ => false,
        })
}

fn violated_key<'a>(
    table: Table,
    row: &Record,
    mut others: impl Iterator<Item = &'a Record>,
) -> Option<&'static [&'static str]> {
    let keys = table.unique_keys();
    others.find_map(|other| {
        keys.iter().copied().find(|key| {
            let columns: Vec<String> = key.iter().map(|c| c.to_string()).collect();
            same_key(&columns, row, other)
        })
    })
}

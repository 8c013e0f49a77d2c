//! PostgreSQL implementation of the RecordStore port.
//!
//! Rows cross the boundary as `jsonb`. Writes go through
//! `jsonb_populate_record`, which casts each key to its column type, and
//! reads come back as `to_jsonb(t.*)`. Only the columns present in a record
//! are written so column defaults (`id`, `created_at`) still apply.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{Conflict, ConflictAction, Filter, FilterOp, Record, RecordStore, Table};

/// PostgreSQL-backed RecordStore.
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Statement text plus its positional `jsonb` parameters.
#[derive(Debug, PartialEq)]
struct Statement {
    sql: String,
    params: Vec<Value>,
}

/// Quotes a column name after checking it is a plain identifier.
fn ident(name: &str) -> Result<String, DomainError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map_or(false, |c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_start || !valid_rest || name.len() > 63 {
        return Err(DomainError::new(
            ErrorCode::ValidationFailed,
            format!("Invalid column name: {:?}", name),
        ));
    }
    Ok(format!("\"{}\"", name))
}

fn where_clause(filters: &[Filter], params: &mut Vec<Value>) -> Result<String, DomainError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut predicates = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = format!("t.{}", ident(&filter.column)?);
        let predicate = match (&filter.op, &filter.value) {
            (FilterOp::Eq, Value::Null) => format!("{} IS NULL", column),
            (FilterOp::NotEq, Value::Null) => format!("{} IS NOT NULL", column),
            (FilterOp::Eq, value) => {
                params.push(value.clone());
                format!("to_jsonb({}) = ${}", column, params.len())
            }
            (FilterOp::NotEq, value) => {
                params.push(value.clone());
                format!("to_jsonb({}) IS DISTINCT FROM ${}", column, params.len())
            }
            (FilterOp::In, Value::Array(values)) if values.is_empty() => "FALSE".to_string(),
            (FilterOp::In, value @ Value::Array(_)) => {
                params.push(value.clone());
                format!("${} @> to_jsonb({})", params.len(), column)
            }
            (FilterOp::In, other) => {
                return Err(DomainError::new(
                    ErrorCode::ValidationFailed,
                    format!("IN filter on {} needs an array, got {}", filter.column, other),
                ))
            }
        };
        predicates.push(predicate);
    }

    Ok(format!(" WHERE {}", predicates.join(" AND ")))
}

fn columns_of(record: &Record) -> Result<Vec<String>, DomainError> {
    if record.is_empty() {
        return Err(DomainError::new(
            ErrorCode::ValidationFailed,
            "Cannot write an empty record",
        ));
    }
    record.keys().map(|k| ident(k)).collect()
}

fn select_statement(table: Table, filters: &[Filter]) -> Result<Statement, DomainError> {
    let mut params = Vec::new();
    let where_sql = where_clause(filters, &mut params)?;
    Ok(Statement {
        sql: format!("SELECT to_jsonb(t.*) FROM {} t{}", table, where_sql),
        params,
    })
}

fn insert_statement(
    table: Table,
    record: Record,
    conflict: Option<&Conflict>,
) -> Result<Statement, DomainError> {
    let columns = columns_of(&record)?;
    let column_list = columns.join(", ");
    let source_list = columns
        .iter()
        .map(|c| format!("r.{}", c))
        .collect::<Vec<_>>()
        .join(", ");

    let on_conflict = match conflict {
        None => String::new(),
        Some(conflict) => {
            let target = conflict
                .columns
                .iter()
                .map(|c| ident(c))
                .collect::<Result<Vec<_>, _>>()?;
            match conflict.action {
                ConflictAction::Ignore => {
                    format!(" ON CONFLICT ({}) DO NOTHING", target.join(", "))
                }
                ConflictAction::Update => {
                    let assignments = columns
                        .iter()
                        .filter(|c| !target.contains(c))
                        .map(|c| format!("{} = EXCLUDED.{}", c, c))
                        .collect::<Vec<_>>();
                    let assignments = if assignments.is_empty() {
                        target
                            .iter()
                            .map(|c| format!("{} = EXCLUDED.{}", c, c))
                            .collect::<Vec<_>>()
                    } else {
                        assignments
                    };
                    format!(
                        " ON CONFLICT ({}) DO UPDATE SET {}",
                        target.join(", "),
                        assignments.join(", ")
                    )
                }
            }
        }
    };

    Ok(Statement {
        sql: format!(
            "INSERT INTO {table} AS t ({column_list}) \
             SELECT {source_list} FROM jsonb_populate_record(NULL::{table}, $1) r\
             {on_conflict} RETURNING to_jsonb(t.*)"
        ),
        params: vec![Value::Object(record)],
    })
}

fn update_statement(
    table: Table,
    changes: Record,
    filters: &[Filter],
) -> Result<Statement, DomainError> {
    let assignments = columns_of(&changes)?
        .iter()
        .map(|c| format!("{} = r.{}", c, c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = vec![Value::Object(changes)];
    let where_sql = where_clause(filters, &mut params)?;

    Ok(Statement {
        sql: format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table}, $1) r{where_sql} \
             RETURNING to_jsonb(t.*)"
        ),
        params,
    })
}

fn map_db_error(table: Table, operation: &str, err: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DomainError::conflict(
                table.as_str(),
                format!(
                    "Unique constraint {} violated",
                    db_err.constraint().unwrap_or("unknown")
                ),
            );
        }
    }
    DomainError::database(format!("Failed to {} {}: {}", operation, table, err))
}

fn into_record(row: Json<Value>) -> Result<Record, DomainError> {
    match row.0 {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::new(
            ErrorCode::SerializationError,
            format!("Row is not a JSON object: {}", other),
        )),
    }
}

impl PostgresRecordStore {
    async fn fetch<'c, E>(
        executor: E,
        statement: &Statement,
        table: Table,
        operation: &str,
    ) -> Result<Vec<Record>, DomainError>
    where
        E: sqlx::Executor<'c, Database = sqlx::Postgres>,
    {
        let mut query = sqlx::query_scalar::<_, Json<Value>>(&statement.sql);
        for param in &statement.params {
            query = query.bind(Json(param.clone()));
        }

        query
            .fetch_all(executor)
            .await
            .map_err(|e| map_db_error(table, operation, e))?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn write_all(
        &self,
        table: Table,
        rows: Vec<Record>,
        conflict: Option<&Conflict>,
    ) -> Result<Vec<Record>, DomainError> {
        let operation = if conflict.is_some() { "upsert" } else { "insert" };
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error(table, operation, e))?;

        let mut written = Vec::with_capacity(rows.len());
        for row in rows {
            let statement = insert_statement(table, row, conflict)?;
            written.extend(Self::fetch(&mut *tx, &statement, table, operation).await?);
        }

        tx.commit()
            .await
            .map_err(|e| map_db_error(table, operation, e))?;
        Ok(written)
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn find(&self, table: Table, filters: &[Filter]) -> Result<Vec<Record>, DomainError> {
        let statement = select_statement(table, filters)?;
        Self::fetch(&self.pool, &statement, table, "query").await
    }

    async fn insert(&self, table: Table, rows: Vec<Record>) -> Result<Vec<Record>, DomainError> {
        self.write_all(table, rows, None).await
    }

    async fn update(
        &self,
        table: Table,
        changes: Record,
        filters: &[Filter],
    ) -> Result<Vec<Record>, DomainError> {
        let statement = update_statement(table, changes, filters)?;
        Self::fetch(&self.pool, &statement, table, "update").await
    }

    async fn upsert(
        &self,
        table: Table,
        rows: Vec<Record>,
        conflict: Conflict,
    ) -> Result<Vec<Record>, DomainError> {
        self.write_all(table, rows, Some(&conflict)).await
    }
}

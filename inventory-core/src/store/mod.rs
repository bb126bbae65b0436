//! Persistence client.
//!
//! Every table is reached through the [`Store`] trait, which exchanges rows as
//! JSON objects keyed by column name. `PgStore` talks to PostgreSQL;
//! `MemoryStore` keeps rows in process and enforces the same constraints.

pub mod memory;
pub mod postgres;
mod table;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use table::Table;

/// Errors raised by a [`Store`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unique constraint {constraint} violated on {table}")]
    UniqueViolation { table: String, constraint: String },

    #[error("Foreign key violation on {table}: {message}")]
    ForeignKeyViolation { table: String, message: String },

    #[error("No row {id} in {table}")]
    NotFound { table: String, id: String },

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Failed to decode row: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table-keyed query/insert/update/delete interface.
///
/// Rows are JSON objects. Inserted rows may omit generated columns (`id`,
/// timestamps); returned rows always carry every column of the table.
#[async_trait]
pub trait Store: Send + Sync {
    /// All rows of `table` in the table's natural order.
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>>;

    /// Rows whose `column` equals `value`.
    async fn select_by(&self, table: Table, column: &str, value: &Value) -> StoreResult<Vec<Value>>;

    /// Insert `rows` as one statement; either all rows land or none do.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>>;

    /// Apply `patch` to the row with `id` and return the updated row.
    async fn update(&self, table: Table, id: Uuid, patch: Value) -> StoreResult<Value>;

    async fn delete(&self, table: Table, id: Uuid) -> StoreResult<()>;

    /// Delete every row of `table`, returning how many were removed.
    async fn delete_all(&self, table: Table) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Check that `row` is an object whose keys are all columns of `table`.
pub(crate) fn validate_columns<'a>(
    table: Table,
    row: &'a Value,
) -> StoreResult<&'a serde_json::Map<String, Value>> {
    let object = row
        .as_object()
        .ok_or_else(|| StoreError::InvalidRow(format!("{} row must be a JSON object", table)))?;

    for key in object.keys() {
        if !table.has_column(key) {
            return Err(StoreError::UnknownColumn(format!("{}.{}", table, key)));
        }
    }

    Ok(object)
}

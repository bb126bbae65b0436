use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::{validate_columns, Store, StoreError, StoreResult, Table};

/// [`Store`] backed by PostgreSQL.
///
/// Rows cross the boundary as `jsonb`: reads use `to_jsonb(row)` and writes
/// go through `jsonb_populate_record`, so column types are handled by the
/// database. Identifiers interpolated into SQL come from [`Table`] only.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

/// Classify an sqlx error by SQLSTATE.
///
/// `23505` is `unique_violation`, `23503` is `foreign_key_violation`.
fn map_sqlx_error(table: Table, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: db_err.constraint().unwrap_or("unknown").to_string(),
            },
            Some("23503") => StoreError::ForeignKeyViolation {
                table: table.to_string(),
                message: db_err.message().to_string(),
            },
            _ => StoreError::Query(db_err.message().to_string()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(err.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn row_value(row: &PgRow) -> StoreResult<Value> {
    row.try_get::<Value, _>("row")
        .map_err(|e| StoreError::Decode(e.to_string()))
}

fn column_list<'a>(columns: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    columns.map(String::as_str).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>> {
        let sql = format!(
            "SELECT to_jsonb(t.*) AS row FROM {table} t ORDER BY t.{order}, t.id",
            table = table,
            order = table.order_column()
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;

        debug!(table = %table, count = rows.len(), "Selected rows");
        rows.iter().map(row_value).collect()
    }

    async fn select_by(&self, table: Table, column: &str, value: &Value) -> StoreResult<Vec<Value>> {
        if !table.has_column(column) {
            return Err(StoreError::UnknownColumn(format!("{}.{}", table, column)));
        }

        let sql = format!(
            "SELECT to_jsonb(t.*) AS row FROM {table} t \
             WHERE to_jsonb(t.*) -> '{column}' = $1 \
             ORDER BY t.{order}, t.id",
            table = table,
            column = column,
            order = table.order_column()
        );

        let rows = sqlx::query(&sql)
            .bind(Json(value))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;

        rows.iter().map(row_value).collect()
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(table, e))?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in &rows {
            let object = validate_columns(table, row)?;
            let columns = column_list(object.keys()).join(", ");

            let result = if columns.is_empty() {
                let sql = format!(
                    "INSERT INTO {table} DEFAULT VALUES RETURNING to_jsonb({table}.*) AS row",
                    table = table
                );
                sqlx::query(&sql).fetch_one(&mut *tx).await
            } else {
                let sql = format!(
                    "INSERT INTO {table} ({columns}) \
                     SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
                     RETURNING to_jsonb({table}.*) AS row",
                    table = table,
                    columns = columns
                );
                sqlx::query(&sql).bind(Json(row)).fetch_one(&mut *tx).await
            };
            let record = result.map_err(|e| map_sqlx_error(table, e))?;

            inserted.push(row_value(&record)?);
        }

        tx.commit().await.map_err(|e| map_sqlx_error(table, e))?;

        debug!(table = %table, count = inserted.len(), "Inserted rows");
        Ok(inserted)
    }

    async fn update(&self, table: Table, id: Uuid, patch: Value) -> StoreResult<Value> {
        let object = validate_columns(table, &patch)?;
        let columns = column_list(object.keys().filter(|key| key.as_str() != "id"));
        if columns.is_empty() {
            return Err(StoreError::InvalidRow(format!("empty update for {}", table)));
        }

        let columns = columns.join(", ");
        let mut assignments = format!(
            "({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1))",
            columns = columns,
            table = table
        );
        if table.has_column("updated_at") && !object.contains_key("updated_at") {
            assignments.push_str(", updated_at = NOW()");
        }

        let sql = format!(
            "UPDATE {table} SET {assignments} WHERE id = $2 RETURNING to_jsonb({table}.*) AS row",
            table = table,
            assignments = assignments
        );

        let record = sqlx::query(&sql)
            .bind(Json(&patch))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;

        row_value(&record)
    }

    async fn delete(&self, table: Table, id: Uuid) -> StoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_all(&self, table: Table) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {}", table);
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

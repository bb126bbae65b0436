use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{validate_columns, Store, StoreError, StoreResult, Table};

type Rows = Vec<Map<String, Value>>;

/// In-process [`Store`].
///
/// Enforces the unique and foreign-key constraints declared on [`Table`], fills
/// generated ids and timestamps, and returns rows with every column present,
/// matching what `PgStore` hands back.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Rows>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held for `table`.
    pub async fn count(&self, table: Table) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn id_of(row: &Map<String, Value>) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Fill defaults and null out absent columns.
fn normalize(table: Table, object: &Map<String, Value>) -> Map<String, Value> {
    let now = Value::String(Utc::now().to_rfc3339());
    let mut row = Map::new();

    for column in table.columns() {
        let value = match object.get(*column) {
            Some(value) if !value.is_null() || *column != "id" => value.clone(),
            _ => match *column {
                "id" => Value::String(Uuid::new_v4().to_string()),
                "created_at" | "updated_at" => now.clone(),
                other => table.default_value(other).unwrap_or(Value::Null),
            },
        };
        row.insert((*column).to_string(), value);
    }

    row
}

fn check_unique(
    table: Table,
    existing: &[Map<String, Value>],
    candidate: &Map<String, Value>,
) -> StoreResult<()> {
    for column in table.unique_columns() {
        let value = match candidate.get(*column) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };

        let clash = existing
            .iter()
            .filter(|row| id_of(row) != id_of(candidate))
            .any(|row| row.get(*column) == Some(value));

        if clash {
            return Err(StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: format!("{}_{}_key", table, column),
            });
        }
    }

    if let Some(id) = id_of(candidate) {
        if existing.iter().any(|row| id_of(row) == Some(id)) {
            return Err(StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: format!("{}_pkey", table),
            });
        }
    }

    Ok(())
}

fn check_references(
    table: Table,
    tables: &HashMap<Table, Rows>,
    candidate: &Map<String, Value>,
) -> StoreResult<()> {
    for (column, target) in table.references() {
        let wanted = match candidate.get(*column).and_then(Value::as_str) {
            Some(id) => id,
            None => continue,
        };

        let present = tables
            .get(target)
            .map(|rows| rows.iter().any(|row| id_of(row) == Some(wanted)))
            .unwrap_or(false);

        if !present {
            return Err(StoreError::ForeignKeyViolation {
                table: table.to_string(),
                message: format!("{}.{} references missing {} {}", table, column, target, wanted),
            });
        }
    }
    Ok(())
}

/// Fail if any row in another table still points at one of `ids` in `table`.
fn check_not_referenced(
    table: Table,
    tables: &HashMap<Table, Rows>,
    ids: &[&str],
) -> StoreResult<()> {
    for referrer in Table::ALL {
        for (column, target) in referrer.references() {
            if *target != table {
                continue;
            }
            let referenced = tables
                .get(&referrer)
                .map(|rows| {
                    rows.iter().any(|row| {
                        row.get(*column)
                            .and_then(Value::as_str)
                            .map(|value| ids.contains(&value))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);

            if referenced {
                return Err(StoreError::ForeignKeyViolation {
                    table: table.to_string(),
                    message: format!("still referenced from {}.{}", referrer, column),
                });
            }
        }
    }
    Ok(())
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        // Postgres sorts NULLs last in ascending order.
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

fn sorted(table: Table, rows: &[Map<String, Value>]) -> Vec<Value> {
    let order = table.order_column();
    let mut rows = rows.to_vec();
    rows.sort_by(|a, b| {
        compare_values(a.get(order), b.get(order))
            .then_with(|| compare_values(a.get("id"), b.get("id")))
    });
    rows.into_iter().map(Value::Object).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn select_all(&self, table: Table) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| sorted(table, rows))
            .unwrap_or_default())
    }

    async fn select_by(&self, table: Table, column: &str, value: &Value) -> StoreResult<Vec<Value>> {
        if !table.has_column(column) {
            return Err(StoreError::UnknownColumn(format!("{}.{}", table, column)));
        }

        let tables = self.tables.read().await;
        let matching: Rows = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.get(column) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(sorted(table, &matching))
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        let mut tables = self.tables.write().await;

        // Validate the whole batch before touching the table.
        let mut staged: Rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let object = validate_columns(table, row)?;
            let candidate = normalize(table, object);

            let existing = tables.get(&table).map(Vec::as_slice).unwrap_or(&[]);
            check_unique(table, existing, &candidate)?;
            check_unique(table, &staged, &candidate)?;
            check_references(table, &tables, &candidate)?;

            staged.push(candidate);
        }

        let inserted = staged.iter().cloned().map(Value::Object).collect();
        tables.entry(table).or_default().extend(staged);
        Ok(inserted)
    }

    async fn update(&self, table: Table, id: Uuid, patch: Value) -> StoreResult<Value> {
        let object = validate_columns(table, &patch)?.clone();
        let mut tables = self.tables.write().await;
        let id_str = id.to_string();

        let current = tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|row| id_of(row) == Some(id_str.as_str())))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                table: table.to_string(),
                id: id_str.clone(),
            })?;

        let mut updated = current;
        for (column, value) in object {
            if column != "id" {
                updated.insert(column, value);
            }
        }
        if table.has_column("updated_at") && patch.get("updated_at").is_none() {
            updated.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }

        let others: Rows = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| id_of(row) != Some(id_str.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        check_unique(table, &others, &updated)?;
        check_references(table, &tables, &updated)?;

        let rows = tables.entry(table).or_default();
        if let Some(slot) = rows.iter_mut().find(|row| id_of(row) == Some(id_str.as_str())) {
            *slot = updated.clone();
        }
        Ok(Value::Object(updated))
    }

    async fn delete(&self, table: Table, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let id_str = id.to_string();

        let exists = tables
            .get(&table)
            .map(|rows| rows.iter().any(|row| id_of(row) == Some(id_str.as_str())))
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::NotFound {
                table: table.to_string(),
                id: id_str,
            });
        }

        check_not_referenced(table, &tables, &[id_str.as_str()])?;

        if let Some(rows) = tables.get_mut(&table) {
            rows.retain(|row| id_of(row) != Some(id_str.as_str()));
        }
        Ok(())
    }

    async fn delete_all(&self, table: Table) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;

        let ids: Vec<String> = tables
            .get(&table)
            .map(|rows| rows.iter().filter_map(id_of).map(str::to_string).collect())
            .unwrap_or_default();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        check_not_referenced(table, &tables, &id_refs)?;

        let removed = tables.remove(&table).map(|rows| rows.len()).unwrap_or(0);
        Ok(removed as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uuid_of(row: &Value) -> Uuid {
        serde_json::from_value(row["id"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_insert_fills_generated_columns() {
        let store = MemoryStore::new();
        let rows = store
            .insert(Table::Categories, vec![json!({ "name": "Snacks" })])
            .await
            .unwrap();

        let row = &rows[0];
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(row["name"], "Snacks");
    }

    #[tokio::test]
    async fn test_batch_insert_is_all_or_nothing() {
        let store = MemoryStore::new();
        let result = store
            .insert(
                Table::Units,
                vec![json!({ "name": "kg" }), json!({ "name": "kg" })],
            )
            .await;

        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
        assert_eq!(store.count(Table::Units).await, 0);
    }

    #[tokio::test]
    async fn test_insert_with_missing_reference_fails() {
        let store = MemoryStore::new();
        let result = store
            .insert(
                Table::Products,
                vec![json!({ "name": "Tea", "category_id": Uuid::new_v4() })],
            )
            .await;

        assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));
    }

    #[tokio::test]
    async fn test_update_checks_uniqueness_against_other_rows() {
        let store = MemoryStore::new();
        let rows = store
            .insert(
                Table::Categories,
                vec![json!({ "name": "Dairy" }), json!({ "name": "Bakery" })],
            )
            .await
            .unwrap();
        let dairy = uuid_of(&rows[0]);

        // Renaming to its own name is fine.
        store
            .update(Table::Categories, dairy, json!({ "name": "Dairy" }))
            .await
            .unwrap();

        let err = store
            .update(Table::Categories, dairy, json!({ "name": "Bakery" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_delete_all_refuses_referenced_rows() {
        let store = MemoryStore::new();
        let unit = store
            .insert(Table::Units, vec![json!({ "name": "pcs" })])
            .await
            .unwrap()
            .remove(0);
        store
            .insert(Table::Products, vec![json!({ "name": "Pen", "unit_id": unit["id"] })])
            .await
            .unwrap();

        assert!(store.delete_all(Table::Units).await.is_err());
        assert_eq!(store.count(Table::Units).await, 1);

        assert_eq!(store.delete_all(Table::Products).await.unwrap(), 1);
        assert_eq!(store.delete_all(Table::Units).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_select_all_orders_by_table_column() {
        let store = MemoryStore::new();
        store
            .insert(
                Table::Categories,
                vec![json!({ "name": "Zinc" }), json!({ "name": "Apples" })],
            )
            .await
            .unwrap();

        let names: Vec<String> = store
            .select_all(Table::Categories)
            .await
            .unwrap()
            .iter()
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Apples", "Zinc"]);
    }
}

//! Full-table JSON backup and restore.
//!
//! A backup reads `products`, `sales`, `purchases` and `purchase_returns` in
//! that order. A restore replaces the same tables in the same order: for each
//! one it deletes every row, then inserts the snapshot rows with their ids.
//! Tables are replaced one at a time with no enclosing transaction, so a
//! failure part-way leaves earlier tables restored and later ones untouched.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::AppError;
use crate::latch::Latch;
use crate::models::BackupDocument;
use crate::store::{Store, StoreError, StoreResult, Table};

/// Tables covered by a backup, in read and restore order.
pub const BACKUP_TABLES: [Table; 4] = [
    Table::Products,
    Table::Sales,
    Table::Purchases,
    Table::PurchaseReturns,
];

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Another backup or restore is already in progress")]
    InProgress,

    #[error("{0}")]
    Parse(String),

    #[error("Failed to read {table}: {source}")]
    Read {
        table: Table,
        #[source]
        source: StoreError,
    },

    #[error("Restore failed on {failed} after replacing [{}]: {source}", table_list(.completed))]
    Aborted {
        completed: Vec<Table>,
        failed: Table,
        #[source]
        source: StoreError,
    },
}

fn table_list(tables: &[Table]) -> String {
    tables
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        let message = err.to_string();
        match err {
            BackupError::InProgress => AppError::Busy(message),
            BackupError::Parse(detail) => AppError::Parse(detail),
            BackupError::Read { source, .. } | BackupError::Aborted { source, .. } => {
                match AppError::from(source) {
                    AppError::Validation(_) => AppError::Validation(message),
                    AppError::AlreadyExists(_) => AppError::AlreadyExists(message),
                    AppError::InUse(_) => AppError::InUse(message),
                    AppError::Internal(_) => AppError::Internal(message),
                    _ => AppError::Store(message),
                }
            }
        }
    }
}

/// Rows written back for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoredTable {
    pub table: Table,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreSummary {
    pub tables: Vec<RestoredTable>,
    pub exported_at: chrono::DateTime<Utc>,
}

pub struct BackupService {
    store: Arc<dyn Store>,
    processing: Latch,
}

impl BackupService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            processing: Latch::new(),
        }
    }

    /// True while a backup or restore runs on this instance.
    pub fn is_processing(&self) -> bool {
        self.processing.is_held()
    }

    /// Snapshot the four record sets.
    ///
    /// Any failed read aborts the whole backup; no partial document is
    /// returned.
    pub async fn create_backup(&self) -> Result<BackupDocument, BackupError> {
        let Some(_guard) = self.processing.try_acquire() else {
            return Err(BackupError::InProgress);
        };

        let mut sets: Vec<Vec<Value>> = Vec::with_capacity(BACKUP_TABLES.len());
        for table in BACKUP_TABLES {
            let rows = self.store.select_all(table).await.map_err(|source| {
                error!(table = %table, error = %source, "Backup read failed");
                BackupError::Read { table, source }
            })?;
            sets.push(rows);
        }

        let mut sets = sets.into_iter();
        let document = BackupDocument {
            products: sets.next().unwrap_or_default(),
            sales: sets.next().unwrap_or_default(),
            purchases: sets.next().unwrap_or_default(),
            purchase_returns: sets.next().unwrap_or_default(),
            exported_at: Utc::now(),
        };

        info!(
            products = document.products.len(),
            sales = document.sales.len(),
            purchases = document.purchases.len(),
            purchase_returns = document.purchase_returns.len(),
            "Backup created"
        );
        Ok(document)
    }

    /// Replace the four tables with the contents of a backup file.
    ///
    /// # Arguments
    /// * `bytes` - Raw backup file; must be a JSON object with all four
    ///   record sets and `exported_at`
    ///
    /// # Returns
    /// Row counts per restored table, or the first failure together with the
    /// tables already replaced
    pub async fn restore_from_backup(&self, bytes: &[u8]) -> Result<RestoreSummary, BackupError> {
        let Some(_guard) = self.processing.try_acquire() else {
            return Err(BackupError::InProgress);
        };

        let document: BackupDocument = serde_json::from_slice(bytes).map_err(|e| {
            error!(error = %e, "Rejected backup file");
            BackupError::Parse(format!("Invalid backup file: {}", e))
        })?;
        let exported_at = document.exported_at;

        let record_sets = [
            (Table::Products, document.products),
            (Table::Sales, document.sales),
            (Table::Purchases, document.purchases),
            (Table::PurchaseReturns, document.purchase_returns),
        ];

        let mut completed = Vec::with_capacity(record_sets.len());
        let mut restored = Vec::with_capacity(record_sets.len());
        for (table, rows) in record_sets {
            match self.replace_table(table, rows).await {
                Ok(count) => {
                    info!(table = %table, rows = count, "Table restored");
                    completed.push(table);
                    restored.push(RestoredTable { table, rows: count });
                }
                Err(source) => {
                    error!(
                        table = %table,
                        completed = %table_list(&completed),
                        error = %source,
                        "Restore aborted"
                    );
                    return Err(BackupError::Aborted {
                        completed,
                        failed: table,
                        source,
                    });
                }
            }
        }

        info!(exported_at = %exported_at, "Restore complete");
        Ok(RestoreSummary {
            tables: restored,
            exported_at,
        })
    }

    async fn replace_table(&self, table: Table, rows: Vec<Value>) -> StoreResult<usize> {
        self.store.delete_all(table).await?;
        if rows.is_empty() {
            return Ok(0);
        }
        let inserted = self.store.insert(table, rows).await?;
        Ok(inserted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use uuid::Uuid;

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let category = store
            .insert(Table::Categories, vec![json!({ "name": "Pantry" })])
            .await
            .unwrap()
            .remove(0);
        let product = store
            .insert(
                Table::Products,
                vec![json!({
                    "name": "Rice 5kg",
                    "category_id": category["id"],
                    "purchase_price": 7.5,
                    "selling_price": 9.99,
                    "quantity": 40,
                })],
            )
            .await
            .unwrap()
            .remove(0);
        store
            .insert(
                Table::Sales,
                vec![
                    json!({
                        "invoice_number": "INV-1", "customer": "Ana",
                        "product_id": product["id"], "product_name": "Rice 5kg",
                        "quantity": 2, "unit_price": 9.99, "total": 19.98,
                    }),
                    json!({
                        "invoice_number": "INV-2", "customer": "Ben",
                        "product_id": product["id"], "product_name": "Rice 5kg",
                        "quantity": 1, "unit_price": 9.99, "total": 9.99,
                    }),
                ],
            )
            .await
            .unwrap();
        let purchase = store
            .insert(
                Table::Purchases,
                vec![json!({
                    "order_number": "PO-1", "supplier": "Grain Co",
                    "product_id": product["id"], "product_name": "Rice 5kg",
                    "quantity": 50, "unit_price": 7.5, "total": 375,
                })],
            )
            .await
            .unwrap()
            .remove(0);
        store
            .insert(
                Table::PurchaseReturns,
                vec![json!({
                    "purchase_order_id": purchase["id"], "product_id": product["id"],
                    "product_name": "Rice 5kg", "supplier": "Grain Co",
                    "original_quantity": 50, "return_quantity": 5,
                    "unit_price": 7.5, "total_refund": 37.5, "reason": "Torn bags",
                })],
            )
            .await
            .unwrap();
        store
    }

    fn record_sets(doc: &BackupDocument) -> [&Vec<Value>; 4] {
        [&doc.products, &doc.sales, &doc.purchases, &doc.purchase_returns]
    }

    #[tokio::test]
    async fn test_restore_of_fresh_backup_reproduces_record_sets() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone());

        let backup = service.create_backup().await.unwrap();
        assert_eq!(backup.sales.len(), 2);
        let bytes = serde_json::to_vec(&backup).unwrap();

        // Drift away from the snapshot.
        let extra = store
            .insert(
                Table::Sales,
                vec![json!({
                    "invoice_number": "INV-3", "customer": "Cy", "product_name": "Rice 5kg",
                    "quantity": 1, "unit_price": 9.99, "total": 9.99,
                })],
            )
            .await
            .unwrap()
            .remove(0);
        let purchase_id: Uuid = serde_json::from_value(backup.purchases[0]["id"].clone()).unwrap();
        store.delete(Table::Purchases, purchase_id).await.unwrap();
        assert_ne!(extra["id"], Value::Null);

        let summary = service.restore_from_backup(&bytes).await.unwrap();
        let counts: Vec<usize> = summary.tables.iter().map(|t| t.rows).collect();
        assert_eq!(counts, vec![1, 2, 1, 1]);
        assert_eq!(summary.exported_at, backup.exported_at);

        let after = service.create_backup().await.unwrap();
        assert_eq!(record_sets(&after), record_sets(&backup));
        assert!(!service.is_processing());
    }

    #[tokio::test]
    async fn test_non_json_input_mutates_nothing() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone());
        let before = service.create_backup().await.unwrap();

        let err = service.restore_from_backup(b"this is not json").await.unwrap_err();
        assert!(matches!(err, BackupError::Parse(_)));

        let partial = json!({ "products": [], "sales": [] }).to_string();
        let err = service.restore_from_backup(partial.as_bytes()).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::Parse(_)));

        let after = service.create_backup().await.unwrap();
        assert_eq!(record_sets(&after), record_sets(&before));
    }

    #[tokio::test]
    async fn test_failure_reports_completed_and_failed_tables() {
        let store = seeded_store().await;
        let service = BackupService::new(store.clone());
        let mut backup = service.create_backup().await.unwrap();
        backup.purchases[0]["warehouse"] = json!("north");
        let bytes = serde_json::to_vec(&backup).unwrap();

        let err = service.restore_from_backup(&bytes).await.unwrap_err();
        match &err {
            BackupError::Aborted {
                completed, failed, ..
            } => {
                assert_eq!(completed, &vec![Table::Products, Table::Sales]);
                assert_eq!(*failed, Table::Purchases);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("products, sales"));

        // Later tables were never touched.
        assert_eq!(store.count(Table::PurchaseReturns).await, 1);
        assert!(!service.is_processing());
    }

    #[tokio::test]
    async fn test_concurrent_restore_rejected() {
        let service = BackupService::new(Arc::new(MemoryStore::new()));
        let _guard = service.processing.try_acquire().unwrap();
        assert!(service.is_processing());

        let err = service.restore_from_backup(b"{}").await.unwrap_err();
        assert!(matches!(err, BackupError::InProgress));
        assert!(matches!(AppError::from(err), AppError::Busy(_)));
    }
}

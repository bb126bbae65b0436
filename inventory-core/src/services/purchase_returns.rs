use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::records::RecordService;
use super::{to_row, ListState};
use crate::error::{AppError, AppResult};
use crate::models::purchase_return::{CreatePurchaseReturn, UpdateReturnStatus};
use crate::models::{PurchaseReturn, ReturnStatus};
use crate::store::{Store, Table};

/// Purchase returns against supplier orders.
///
/// New returns always start `Pending`. Leaving `Pending` stamps
/// `processed_by` and `processed_date`; moving back to `Pending` clears them.
pub struct PurchaseReturnService {
    records: RecordService<PurchaseReturn>,
}

impl PurchaseReturnService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            records: RecordService::new(store, Table::PurchaseReturns),
        }
    }

    pub async fn list(&self) -> AppResult<Vec<PurchaseReturn>> {
        self.records.list().await
    }

    pub async fn snapshot(&self) -> ListState<PurchaseReturn> {
        self.records.snapshot().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseReturn> {
        self.records.get(id).await
    }

    /// Create a return in `Pending` status.
    ///
    /// # Arguments
    /// * `input` - Return request; `total_refund` defaults to
    ///   `return_quantity * unit_price`
    ///
    /// # Returns
    /// The stored return
    pub async fn create(&self, input: CreatePurchaseReturn) -> AppResult<PurchaseReturn> {
        let row = match build_return_row(&input) {
            Ok(row) => row,
            Err(e) => return Err(self.records.reject("create", e).await),
        };

        let created = self.records.insert_row(row).await?;
        info!(
            return_id = %created.id,
            purchase_order_id = %created.purchase_order_id,
            "Purchase return created"
        );
        Ok(created)
    }

    /// Move a return to `update.status`.
    pub async fn update_status(
        &self,
        id: Uuid,
        update: UpdateReturnStatus,
    ) -> AppResult<PurchaseReturn> {
        let patch = status_patch(&update);
        let updated = self.records.update_row(id, patch).await?;

        info!(return_id = %id, status = %updated.status, "Purchase return status changed");
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.records.delete(id).await
    }
}

fn build_return_row(input: &CreatePurchaseReturn) -> AppResult<Value> {
    if input.product_name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".to_string()));
    }
    if input.reason.trim().is_empty() {
        return Err(AppError::Validation("Return reason is required".to_string()));
    }
    if input.return_quantity <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Return quantity must be greater than zero".to_string(),
        ));
    }
    if input.return_quantity > input.original_quantity {
        return Err(AppError::Validation(format!(
            "Return quantity {} exceeds ordered quantity {}",
            input.return_quantity, input.original_quantity
        )));
    }

    let mut row = to_row(input)?;
    if let Value::Object(map) = &mut row {
        let refund = input
            .total_refund
            .unwrap_or(input.return_quantity * input.unit_price);
        map.insert("total_refund".to_string(), to_row(&refund)?);
        map.insert("status".to_string(), json!(ReturnStatus::Pending));
        map.remove("processed_by");
        map.remove("processed_date");
    }
    Ok(row)
}

fn status_patch(update: &UpdateReturnStatus) -> Value {
    match update.status {
        ReturnStatus::Pending => json!({
            "status": update.status,
            "processed_by": Value::Null,
            "processed_date": Value::Null,
        }),
        status => json!({
            "status": status,
            "processed_by": update.processed_by,
            "processed_date": Utc::now(),
        }),
    }
}

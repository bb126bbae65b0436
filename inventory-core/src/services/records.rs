use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{decode_row, single_row, to_row, ListState, TableCache};
use crate::error::{AppError, AppResult};
use crate::models::product::{CreateProduct, UpdateProduct};
use crate::models::voucher::{CreatePurchase, CreateSale, UpdateVoucher};
use crate::models::{Product, Purchase, Sale};
use crate::store::{Store, StoreError, Table};

/// CRUD over one table with a reload after every write.
pub struct RecordService<T> {
    cache: TableCache<T>,
}

pub type ProductService = RecordService<Product>;
pub type SaleService = RecordService<Sale>;
pub type PurchaseService = RecordService<Purchase>;

impl<T> RecordService<T>
where
    T: DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(store: Arc<dyn Store>, table: Table) -> Self {
        Self {
            cache: TableCache::new(store, table),
        }
    }

    pub fn table(&self) -> Table {
        self.cache.table()
    }

    pub async fn list(&self) -> AppResult<Vec<T>> {
        self.cache.refresh().await
    }

    pub async fn snapshot(&self) -> ListState<T> {
        self.cache.snapshot().await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<T> {
        let rows = self
            .cache
            .store()
            .select_by(self.table(), "id", &json!(id))
            .await?;

        match rows.into_iter().next() {
            Some(row) => decode_row(row),
            None => Err(AppError::NotFound(format!("{} record {} not found", self.table(), id))),
        }
    }

    pub async fn create<I: Serialize>(&self, input: &I) -> AppResult<T> {
        let row = to_row(input)?;
        self.insert_row(row).await
    }

    /// Writes only ever reference other rows, so a foreign-key failure
    /// means the reference is missing rather than in use.
    fn write_error(&self, err: StoreError) -> AppError {
        match err {
            StoreError::ForeignKeyViolation { .. } => AppError::Validation(format!(
                "{} record references a missing category or unit",
                self.table()
            )),
            other => other.into(),
        }
    }

    pub(crate) async fn insert_row(&self, row: Value) -> AppResult<T> {
        let rows = match self.cache.store().insert(self.table(), vec![row]).await {
            Ok(rows) => rows,
            Err(e) => return Err(self.cache.fail("create", self.write_error(e)).await),
        };

        let created = decode_row(single_row(self.table(), rows)?)?;
        info!(table = %self.table(), "Created record");

        self.cache.invalidate().await;
        Ok(created)
    }

    /// Apply a partial update; fields absent from `patch` keep their value.
    pub async fn update<P: Serialize>(&self, id: Uuid, patch: &P) -> AppResult<T> {
        let patch = to_row(patch)?;
        self.update_row(id, patch).await
    }

    pub(crate) async fn update_row(&self, id: Uuid, patch: Value) -> AppResult<T> {
        let row = match self.cache.store().update(self.table(), id, patch).await {
            Ok(row) => row,
            Err(e) => return Err(self.cache.fail("update", self.write_error(e)).await),
        };

        let updated = decode_row(row)?;
        info!(table = %self.table(), id = %id, "Updated record");

        self.cache.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if let Err(e) = self.cache.store().delete(self.table(), id).await {
            return Err(self.cache.fail("delete", e.into()).await);
        }

        info!(table = %self.table(), id = %id, "Deleted record");
        self.cache.invalidate().await;
        Ok(())
    }

    pub(crate) async fn reject(&self, operation: &str, err: AppError) -> AppError {
        self.cache.fail(operation, err).await
    }
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_positive(field: &str, value: Decimal) -> AppResult<()> {
    if value <= Decimal::ZERO {
        return Err(AppError::Validation(format!("{} must be greater than zero", field)));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: Decimal) -> AppResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::Validation(format!("{} cannot be negative", field)));
    }
    Ok(())
}

impl RecordService<Product> {
    pub fn products(store: Arc<dyn Store>) -> Self {
        Self::new(store, Table::Products)
    }

    pub async fn add_product(&self, input: CreateProduct) -> AppResult<Product> {
        let checked = require_text("Product name", &input.name)
            .and_then(|_| require_non_negative("Purchase price", input.purchase_price))
            .and_then(|_| require_non_negative("Selling price", input.selling_price))
            .and_then(|_| require_non_negative("Quantity", input.quantity));
        if let Err(e) = checked {
            return Err(self.reject("create", e).await);
        }

        self.create(&input).await
    }

    pub async fn edit_product(&self, id: Uuid, patch: UpdateProduct) -> AppResult<Product> {
        if let Some(name) = &patch.name {
            if let Err(e) = require_text("Product name", name) {
                return Err(self.reject("update", e).await);
            }
        }

        self.update(id, &patch).await
    }
}

impl RecordService<Sale> {
    pub fn sales(store: Arc<dyn Store>) -> Self {
        Self::new(store, Table::Sales)
    }

    /// Record a sale; `total` is `quantity * unit_price` unless supplied.
    pub async fn record_sale(&self, input: CreateSale) -> AppResult<Sale> {
        let checked = require_text("Invoice number", &input.invoice_number)
            .and_then(|_| require_text("Product name", &input.product_name))
            .and_then(|_| require_positive("Quantity", input.quantity))
            .and_then(|_| require_non_negative("Unit price", input.unit_price));
        if let Err(e) = checked {
            return Err(self.reject("create", e).await);
        }

        self.create(&input.with_computed_total()).await
    }

    pub async fn edit_sale(&self, id: Uuid, patch: UpdateVoucher) -> AppResult<Sale> {
        let patch = if keeps_total(&patch) {
            patch
        } else {
            match self.get(id).await {
                Ok(current) => with_recomputed_total(patch, current.quantity, current.unit_price),
                Err(e) => return Err(self.reject("update", e).await),
            }
        };
        self.update(id, &patch).await
    }
}

impl RecordService<Purchase> {
    pub fn purchases(store: Arc<dyn Store>) -> Self {
        Self::new(store, Table::Purchases)
    }

    /// Record a purchase order; `total` is `quantity * unit_price` unless supplied.
    pub async fn record_purchase(&self, input: CreatePurchase) -> AppResult<Purchase> {
        let checked = require_text("Order number", &input.order_number)
            .and_then(|_| require_text("Product name", &input.product_name))
            .and_then(|_| require_positive("Quantity", input.quantity))
            .and_then(|_| require_non_negative("Unit price", input.unit_price));
        if let Err(e) = checked {
            return Err(self.reject("create", e).await);
        }

        self.create(&input.with_computed_total()).await
    }

    pub async fn edit_purchase(&self, id: Uuid, patch: UpdateVoucher) -> AppResult<Purchase> {
        let patch = if keeps_total(&patch) {
            patch
        } else {
            match self.get(id).await {
                Ok(current) => with_recomputed_total(patch, current.quantity, current.unit_price),
                Err(e) => return Err(self.reject("update", e).await),
            }
        };
        self.update(id, &patch).await
    }
}

fn keeps_total(patch: &UpdateVoucher) -> bool {
    patch.total.is_some() || (patch.quantity.is_none() && patch.unit_price.is_none())
}

/// Keep `total` in step when only quantity or price changes.
fn with_recomputed_total(mut patch: UpdateVoucher, quantity: Decimal, unit_price: Decimal) -> UpdateVoucher {
    let quantity = patch.quantity.unwrap_or(quantity);
    let unit_price = patch.unit_price.unwrap_or(unit_price);
    patch.total = Some(quantity * unit_price);
    patch
}

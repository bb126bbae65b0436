use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{decode_row, single_row, ListState, TableCache};
use crate::error::{AppError, AppResult};
use crate::models::{Category, Unit};
use crate::store::{Store, StoreError, Table};

/// Longest accepted category or unit name.
const MAX_NAME_LENGTH: usize = 255;

/// Name-only catalog (categories, units).
///
/// Uniqueness and the "still used by a product" rule are enforced by the
/// store; this service only translates the violations.
pub struct NameCatalog<T> {
    cache: TableCache<T>,
    label: &'static str,
}

pub type CategoryService = NameCatalog<Category>;
pub type UnitService = NameCatalog<Unit>;

impl NameCatalog<Category> {
    pub fn categories(store: Arc<dyn Store>) -> Self {
        Self {
            cache: TableCache::new(store, Table::Categories),
            label: "Category",
        }
    }
}

impl NameCatalog<Unit> {
    pub fn units(store: Arc<dyn Store>) -> Self {
        Self {
            cache: TableCache::new(store, Table::Units),
            label: "Unit",
        }
    }
}

impl<T> NameCatalog<T>
where
    T: DeserializeOwned + Clone + Send + Sync,
{
    pub async fn list(&self) -> AppResult<Vec<T>> {
        self.cache.refresh().await
    }

    pub async fn snapshot(&self) -> ListState<T> {
        self.cache.snapshot().await
    }

    fn validate_name(&self, name: &str) -> AppResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(format!("{} name is required", self.label)));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::Validation(format!(
                "{} name must be at most {} characters",
                self.label, MAX_NAME_LENGTH
            )));
        }
        Ok(name.to_string())
    }

    fn translate(&self, err: StoreError, name: Option<&str>) -> AppError {
        match err {
            StoreError::UniqueViolation { .. } => AppError::AlreadyExists(match name {
                Some(name) => format!("{} '{}' may already exist", self.label, name),
                None => format!("{} may already exist", self.label),
            }),
            StoreError::ForeignKeyViolation { .. } => {
                AppError::InUse(format!("{} may be in use by products", self.label))
            }
            other => other.into(),
        }
    }

    pub async fn add(&self, name: &str) -> AppResult<T> {
        let name = match self.validate_name(name) {
            Ok(name) => name,
            Err(e) => return Err(self.cache.fail("add", e).await),
        };

        let result = self
            .cache
            .store()
            .insert(self.cache.table(), vec![json!({ "name": name })])
            .await;
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => return Err(self.cache.fail("add", self.translate(e, Some(&name))).await),
        };

        let created = decode_row(single_row(self.cache.table(), rows)?)?;
        info!(table = %self.cache.table(), name = %name, "Added entry");

        self.cache.invalidate().await;
        Ok(created)
    }

    pub async fn edit(&self, id: Uuid, name: &str) -> AppResult<T> {
        let name = match self.validate_name(name) {
            Ok(name) => name,
            Err(e) => return Err(self.cache.fail("edit", e).await),
        };

        let result = self
            .cache
            .store()
            .update(self.cache.table(), id, json!({ "name": name }))
            .await;
        let row = match result {
            Ok(row) => row,
            Err(e) => return Err(self.cache.fail("edit", self.translate(e, Some(&name))).await),
        };

        let updated = decode_row(row)?;
        info!(table = %self.cache.table(), id = %id, name = %name, "Renamed entry");

        self.cache.invalidate().await;
        Ok(updated)
    }

    /// Fails with [`AppError::InUse`] while any product references the entry.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if let Err(e) = self.cache.store().delete(self.cache.table(), id).await {
            return Err(self.cache.fail("delete", self.translate(e, None)).await);
        }

        info!(table = %self.cache.table(), id = %id, "Deleted entry");
        self.cache.invalidate().await;
        Ok(())
    }
}

//! Domain services.
//!
//! Each service wraps one table and mirrors it into an in-memory
//! [`ListState`]. Every successful write is followed by a full reload of that
//! table; there is no incremental merging.

pub mod catalog;
pub mod profiles;
pub mod purchase_returns;
pub mod records;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, warn};

use crate::error::{AppError, AppResult};
use crate::store::{Store, Table};

pub use catalog::{CategoryService, NameCatalog, UnitService};
pub use purchase_returns::PurchaseReturnService;
pub use records::{ProductService, PurchaseService, RecordService, SaleService};

/// Cached rows of one table plus loading and error flags.
#[derive(Debug, Clone, Serialize)]
pub struct ListState<T> {
    pub items: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Decode a store row into a model.
pub fn decode_row<T: DeserializeOwned>(row: Value) -> AppResult<T> {
    serde_json::from_value(row).map_err(AppError::from)
}

/// Encode a request body as a store row.
pub fn to_row<I: Serialize>(input: &I) -> AppResult<Value> {
    serde_json::to_value(input)
        .map_err(|e| AppError::Internal(format!("Failed to encode row: {}", e)))
}

/// Table mirror shared by the services.
pub struct TableCache<T> {
    store: Arc<dyn Store>,
    table: Table,
    state: RwLock<ListState<T>>,
}

impl<T> TableCache<T>
where
    T: DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(store: Arc<dyn Store>, table: Table) -> Self {
        Self {
            store,
            table,
            state: RwLock::new(ListState::default()),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn table(&self) -> Table {
        self.table
    }

    /// Reload every row of the table into the cache.
    pub async fn refresh(&self) -> AppResult<Vec<T>> {
        self.state.write().await.loading = true;

        let result = self.load().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match &result {
            Ok(items) => {
                state.items = items.clone();
                state.error = None;
            }
            Err(e) => {
                error!(table = %self.table, error = %e, "Failed to load rows");
                state.error = Some(e.to_string());
            }
        }
        result
    }

    async fn load(&self) -> AppResult<Vec<T>> {
        self.store
            .select_all(self.table)
            .await?
            .into_iter()
            .map(decode_row)
            .collect()
    }

    pub async fn snapshot(&self) -> ListState<T> {
        self.state.read().await.clone()
    }

    /// Reload after a completed write. A failed reload leaves the write in
    /// place and is only recorded in the list state.
    pub async fn invalidate(&self) {
        if let Err(e) = self.refresh().await {
            warn!(table = %self.table, error = %e, "Reload after write failed");
        }
    }

    /// Log a failed operation, record it in the list state and hand it back.
    pub async fn fail(&self, operation: &str, err: AppError) -> AppError {
        error!(table = %self.table, operation, error = %err, "Operation failed");
        self.state.write().await.error = Some(err.to_string());
        err
    }
}

/// First row of an insert/update result.
pub(crate) fn single_row(table: Table, rows: Vec<Value>) -> AppResult<Value> {
    rows.into_iter()
        .next()
        .ok_or_else(|| AppError::Internal(format!("{} write returned no row", table)))
}

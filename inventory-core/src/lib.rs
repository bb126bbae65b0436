//! Inventory management backend.
//!
//! Catalogs (categories, units, products), sales and purchase vouchers,
//! purchase returns, PDF vouchers, user provisioning and JSON backup/restore
//! over PostgreSQL.

pub mod api;
pub mod auth;
pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod latch;
pub mod models;
pub mod pdf;
pub mod provisioning;
pub mod services;
pub mod session;
pub mod store;

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::backup::BackupService;
use crate::provisioning::UserProvisioner;
use crate::services::{
    CategoryService, ProductService, PurchaseReturnService, PurchaseService, SaleService,
    UnitService,
};
use crate::store::Store;

/// Shared state handed to every route handler.
///
/// Services are created once per process so their list caches and latches
/// are shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
    pub categories: Arc<CategoryService>,
    pub units: Arc<UnitService>,
    pub products: Arc<ProductService>,
    pub sales: Arc<SaleService>,
    pub purchases: Arc<PurchaseService>,
    pub purchase_returns: Arc<PurchaseReturnService>,
    pub backup: Arc<BackupService>,
    pub provisioner: Arc<UserProvisioner>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            categories: Arc::new(CategoryService::categories(store.clone())),
            units: Arc::new(UnitService::units(store.clone())),
            products: Arc::new(ProductService::products(store.clone())),
            sales: Arc::new(SaleService::sales(store.clone())),
            purchases: Arc::new(PurchaseService::purchases(store.clone())),
            purchase_returns: Arc::new(PurchaseReturnService::new(store.clone())),
            backup: Arc::new(BackupService::new(store.clone())),
            provisioner: Arc::new(UserProvisioner::new(auth.clone(), store.clone())),
            store,
            auth,
        }
    }
}

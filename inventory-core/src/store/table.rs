use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Tables reachable through the persistence client.
///
/// The column lists mirror `migrations/` and double as the allow-list for
/// identifiers interpolated into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Categories,
    Units,
    Products,
    Sales,
    Purchases,
    PurchaseReturns,
    UserProfiles,
    Companies,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Categories,
        Table::Units,
        Table::Products,
        Table::Sales,
        Table::Purchases,
        Table::PurchaseReturns,
        Table::UserProfiles,
        Table::Companies,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Categories => "categories",
            Table::Units => "units",
            Table::Products => "products",
            Table::Sales => "sales",
            Table::Purchases => "purchases",
            Table::PurchaseReturns => "purchase_returns",
            Table::UserProfiles => "user_profiles",
            Table::Companies => "companies",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Categories | Table::Units => &["id", "name", "created_at", "updated_at"],
            Table::Products => &[
                "id",
                "name",
                "sku",
                "category_id",
                "unit_id",
                "purchase_price",
                "selling_price",
                "quantity",
                "created_at",
                "updated_at",
            ],
            Table::Sales => &[
                "id",
                "invoice_number",
                "customer",
                "product_id",
                "product_name",
                "quantity",
                "unit_price",
                "total",
                "sale_date",
                "created_at",
            ],
            Table::Purchases => &[
                "id",
                "order_number",
                "supplier",
                "product_id",
                "product_name",
                "quantity",
                "unit_price",
                "total",
                "purchase_date",
                "created_at",
            ],
            Table::PurchaseReturns => &[
                "id",
                "purchase_order_id",
                "purchase_item_id",
                "product_id",
                "product_name",
                "supplier",
                "original_quantity",
                "return_quantity",
                "unit_price",
                "total_refund",
                "return_date",
                "reason",
                "notes",
                "status",
                "processed_by",
                "processed_date",
            ],
            Table::UserProfiles => &[
                "id",
                "user_id",
                "company_id",
                "username",
                "role",
                "permissions",
                "is_active",
            ],
            Table::Companies => &["id", "name", "address", "phone", "email"],
        }
    }

    pub fn has_column(self, column: &str) -> bool {
        self.columns().contains(&column)
    }

    /// Columns covered by a UNIQUE constraint.
    pub fn unique_columns(self) -> &'static [&'static str] {
        match self {
            Table::Categories | Table::Units => &["name"],
            Table::UserProfiles => &["user_id"],
            _ => &[],
        }
    }

    /// Foreign keys as `(column, referenced table)`; the referenced column is `id`.
    pub fn references(self) -> &'static [(&'static str, Table)] {
        match self {
            Table::Products => &[("category_id", Table::Categories), ("unit_id", Table::Units)],
            Table::UserProfiles => &[("company_id", Table::Companies)],
            _ => &[],
        }
    }

    /// Column used to order `select_all`; ties break on `id`.
    pub fn order_column(self) -> &'static str {
        match self {
            Table::Categories | Table::Units | Table::Products | Table::Companies => "name",
            Table::Sales | Table::Purchases => "created_at",
            Table::PurchaseReturns => "return_date",
            Table::UserProfiles => "username",
        }
    }

    /// Column default applied when an insert omits the column.
    /// Generated ids and timestamps are handled by the store itself.
    pub fn default_value(self, column: &str) -> Option<Value> {
        match (self, column) {
            (Table::PurchaseReturns, "status") => Some(json!("Pending")),
            (Table::UserProfiles, "role") => Some(json!("staff")),
            (Table::UserProfiles, "permissions") => Some(json!([])),
            (Table::UserProfiles, "is_active") => Some(json!(true)),
            (Table::Products, "purchase_price")
            | (Table::Products, "selling_price")
            | (Table::Products, "quantity") => Some(json!(0)),
            (Table::Sales, "sale_date")
            | (Table::Purchases, "purchase_date")
            | (Table::PurchaseReturns, "return_date") => {
                Some(json!(Utc::now().date_naive().to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

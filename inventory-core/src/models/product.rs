use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product model. Maps to the `products` table.
///
/// `category_id` and `unit_id` are foreign keys, which is what makes a
/// referenced category or unit undeletable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,

    pub name: String,

    /// Stock keeping unit code
    pub sku: Option<String>,

    pub category_id: Option<Uuid>,

    pub unit_id: Option<Uuid>,

    /// Cost per unit when bought
    pub purchase_price: Decimal,

    /// Price per unit when sold
    pub selling_price: Decimal,

    /// Quantity on hand
    pub quantity: Decimal,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Product creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub purchase_price: Decimal,
    #[serde(default)]
    pub selling_price: Decimal,
    #[serde(default)]
    pub quantity: Decimal,
}

/// Product update request; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProduct {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
}

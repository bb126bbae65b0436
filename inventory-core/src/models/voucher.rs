use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sales voucher. Maps to the `sales` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer: String,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub sale_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Purchase voucher. Maps to the `purchases` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub order_number: String,
    pub supplier: String,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub purchase_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Sale creation request. `total` defaults to `quantity * unit_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSale {
    pub invoice_number: String,
    pub customer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<NaiveDate>,
}

/// Purchase creation request. `total` defaults to `quantity * unit_price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchase {
    pub order_number: String,
    pub supplier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
}

/// Partial update shared by sales and purchases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVoucher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl CreateSale {
    pub fn with_computed_total(mut self) -> Self {
        if self.total.is_none() {
            self.total = Some(self.quantity * self.unit_price);
        }
        self
    }
}

impl CreatePurchase {
    pub fn with_computed_total(mut self) -> Self {
        if self.total.is_none() {
            self.total = Some(self.quantity * self.unit_price);
        }
        self
    }
}

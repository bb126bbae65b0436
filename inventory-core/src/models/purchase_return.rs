use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Purchase return status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReturnStatus::Pending => "Pending",
            ReturnStatus::Approved => "Approved",
            ReturnStatus::Rejected => "Rejected",
            ReturnStatus::Processed => "Processed",
        };
        f.write_str(label)
    }
}

/// Goods sent back to a supplier against a purchase order.
///
/// Maps to the `purchase_returns` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReturn {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub purchase_item_id: Option<Uuid>,
    pub product_id: Uuid,
    pub product_name: String,
    pub supplier: String,
    pub original_quantity: Decimal,
    pub return_quantity: Decimal,
    pub unit_price: Decimal,
    pub total_refund: Decimal,
    pub return_date: NaiveDate,
    pub reason: String,
    pub notes: Option<String>,
    pub status: ReturnStatus,

    /// Who moved the return out of `Pending`
    pub processed_by: Option<String>,

    /// When the return left `Pending`
    pub processed_date: Option<DateTime<Utc>>,
}

/// Return request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseReturn {
    pub purchase_order_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_item_id: Option<Uuid>,
    pub product_id: Uuid,
    pub product_name: String,
    pub supplier: String,
    pub original_quantity: Decimal,
    pub return_quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_refund: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Status transition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReturnStatus {
    pub status: ReturnStatus,
    #[serde(default)]
    pub processed_by: Option<String>,
}

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON snapshot of the voucher and product tables.
///
/// Rows are kept as raw JSON so a restore writes back exactly what was read.
/// There is no schema version or checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub products: Vec<Value>,
    pub sales: Vec<Value>,
    pub purchases: Vec<Value>,
    pub purchase_returns: Vec<Value>,
    pub exported_at: DateTime<Utc>,
}

impl BackupDocument {
    /// Download name, e.g. `inventory-backup-2024-05-01T10-15-00Z.json`.
    pub fn file_name(&self) -> String {
        let stamp = self
            .exported_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "-");
        format!("inventory-backup-{}.json", stamp)
    }
}

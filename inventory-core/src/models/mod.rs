pub mod backup;
pub mod catalog;
pub mod product;
pub mod profile;
pub mod purchase_return;
pub mod voucher;

pub use backup::BackupDocument;
pub use catalog::{Category, Unit};
pub use product::Product;
pub use profile::{Company, ProfileWithCompany, Role, UserProfile};
pub use purchase_return::{PurchaseReturn, ReturnStatus};
pub use voucher::{Purchase, Sale};

pub mod engine;
pub mod ledger;
pub mod models;

pub use engine::{SaleEngine, SaleError};
pub use ledger::SaleLedger;
pub use models::{RequestedItem, Sale, SaleItem, SaleRequest};

use async_trait::async_trait;
use uuid::Uuid;

use mercato_catalog::StockDelta;
use mercato_core::StoreError;

use crate::models::Sale;

/// Repository trait for the sale ledger.
///
/// `commit_sale` and `revoke_sale` are the engine's transaction boundary:
/// the backend applies the given stock deltas and the ledger write (or
/// delete) atomically, re-checking the non-negativity guard per product
/// under its own lock or row locks. Either every effect becomes visible
/// together or none do.
#[async_trait]
pub trait SaleLedger: Send + Sync {
    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, StoreError>;

    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError>;

    async fn find_sales_by_customer(&self, customer_id: Uuid) -> Result<Vec<Sale>, StoreError>;

    /// True while any recorded sale still references the product.
    async fn product_in_use(&self, product_id: Uuid) -> Result<bool, StoreError>;

    /// Apply every delta and persist the sale in one transaction.
    async fn commit_sale(&self, sale: &Sale, deltas: &[StockDelta]) -> Result<(), StoreError>;

    /// Apply every restore and delete the sale (items cascade with it) in
    /// one transaction. Fails with `SaleNotFound` when the sale is absent.
    async fn revoke_sale(&self, id: Uuid, restores: &[StockDelta]) -> Result<(), StoreError>;
}

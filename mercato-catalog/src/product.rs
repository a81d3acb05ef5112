use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mercato_core::StoreError;

/// A sellable catalog entry. `stock_quantity` is the authoritative count of
/// sellable units and must never go negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Price in cents. Prices are integer minor units, never floats.
    pub price_cents: i64,
    pub stock_quantity: i64,
    /// External code, unique across all products.
    pub barcode: String,
}

impl Product {
    pub fn new(name: impl Into<String>, price_cents: i64, stock_quantity: i64, barcode: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price_cents,
            stock_quantity,
            barcode: barcode.into(),
        }
    }
}

/// Repository trait for product and stock data access.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Insert or replace. Fails with `BarcodeTaken` when another product
    /// already carries the same barcode.
    async fn save_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Returns false when no such product exists.
    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Atomic stock adjustment: delta negative for a sale, positive for a
    /// cancellation or restock. Fails with `InsufficientStock` when the
    /// result would be negative, leaving the count unchanged; no reader
    /// ever observes an intermediate value.
    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<i64, StoreError>;
}

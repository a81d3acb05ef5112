use uuid::Uuid;

/// Errors surfaced by the storage backends.
///
/// The expected, recoverable conditions are typed so callers can react to
/// each kind; `Backend` wraps driver faults no caller can do anything about.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("sale not found: {0}")]
    SaleNotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("barcode already in use: {0}")]
    BarcodeTaken(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

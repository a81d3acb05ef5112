use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use mercato_catalog::{ProductCatalog, StockDelta};
use mercato_core::StoreError;
use mercato_parties::CustomerDirectory;

use crate::ledger::SaleLedger;
use crate::models::{Sale, SaleItem, SaleRequest};

/// The sale transaction engine.
///
/// Orchestrates order creation and cancellation across the customer
/// directory, the product catalog and the sale ledger. All validation runs
/// against a read-only snapshot first; the storage layer then applies every
/// stock delta and the ledger write inside one transaction. A failure at
/// any point leaves no observable change — there is no partial state to
/// roll back because nothing is mutated before the single commit.
pub struct SaleEngine {
    directory: Arc<dyn CustomerDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    ledger: Arc<dyn SaleLedger>,
}

impl SaleEngine {
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        ledger: Arc<dyn SaleLedger>,
    ) -> Self {
        Self {
            directory,
            catalog,
            ledger,
        }
    }

    /// Create a sale from `request`, decrementing stock for every item.
    ///
    /// Any failure — unknown customer, unknown product, insufficient stock
    /// for any single item — aborts the whole order: no sale is persisted
    /// and no stock changes.
    pub async fn create_sale(&self, request: SaleRequest) -> Result<Sale, SaleError> {
        if request.items.is_empty() {
            return Err(SaleError::EmptySale);
        }
        for item in &request.items {
            if item.quantity <= 0 {
                return Err(SaleError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
            if matches!(item.unit_price_cents, Some(price) if price < 0) {
                return Err(SaleError::InvalidPrice {
                    product_id: item.product_id,
                });
            }
        }

        let customer = self
            .directory
            .find_customer(request.customer_id)
            .await?
            .ok_or(SaleError::CustomerNotFound(request.customer_id))?;

        // Read-only pass, in caller order: snapshot prices, accumulate the
        // total and one delta per item. Nothing is mutated yet.
        let mut items = Vec::with_capacity(request.items.len());
        let mut deltas = Vec::with_capacity(request.items.len());
        for requested in &request.items {
            let product = self
                .catalog
                .find_product(requested.product_id)
                .await?
                .ok_or(SaleError::ProductNotFound(requested.product_id))?;

            if product.stock_quantity < requested.quantity {
                return Err(SaleError::InsufficientStock {
                    product_id: product.id,
                    requested: requested.quantity,
                    available: product.stock_quantity,
                });
            }

            items.push(SaleItem {
                id: Uuid::new_v4(),
                product_id: product.id,
                quantity: requested.quantity,
                unit_price_cents: requested.unit_price_cents.unwrap_or(product.price_cents),
            });
            deltas.push(StockDelta::new(product.id, -requested.quantity));
        }

        let sale_date = request.sale_date.unwrap_or_else(|| Utc::now().date_naive());
        let sale = Sale::assemble(customer.id, sale_date, items);

        // One transaction: every decrement plus the ledger write. The store
        // re-checks the stock guard under its lock, which also catches a
        // request listing the same product on several lines.
        self.ledger.commit_sale(&sale, &deltas).await?;

        info!(
            sale_id = %sale.id,
            customer_id = %sale.customer_id,
            total_cents = sale.total_cents,
            "sale committed"
        );
        Ok(sale)
    }

    /// Cancel a sale: restore the stock consumed by each of its items and
    /// delete it from the ledger, atomically. If restoration for any item
    /// fails the sale stays in the ledger and no restore is visible.
    pub async fn cancel_sale(&self, id: Uuid) -> Result<Sale, SaleError> {
        let sale = self
            .ledger
            .find_sale(id)
            .await?
            .ok_or(SaleError::SaleNotFound(id))?;

        let restores: Vec<StockDelta> = sale
            .items
            .iter()
            .map(|item| StockDelta::new(item.product_id, item.quantity))
            .collect();

        self.ledger.revoke_sale(sale.id, &restores).await?;

        info!(sale_id = %sale.id, "sale cancelled, stock restored");
        Ok(sale)
    }

    /// Delete a customer. Refused with `CustomerHasSales` while sales are
    /// recorded, unless `cascade` is set — then every sale is cancelled
    /// first (restoring its stock) and the customer removed afterwards.
    pub async fn delete_customer(&self, id: Uuid, cascade: bool) -> Result<(), SaleError> {
        if self.directory.find_customer(id).await?.is_none() {
            return Err(SaleError::CustomerNotFound(id));
        }

        let sales = self.ledger.find_sales_by_customer(id).await?;
        if !sales.is_empty() {
            if !cascade {
                return Err(SaleError::CustomerHasSales(id));
            }
            for sale in sales {
                self.cancel_sale(sale.id).await?;
            }
        }

        self.directory.remove_customer(id).await?;
        Ok(())
    }

    /// Delete a product. Refused with `ProductInUse` while any sale still
    /// references it; those sales must be cancelled first.
    pub async fn delete_product(&self, id: Uuid) -> Result<(), SaleError> {
        if self.catalog.find_product(id).await?.is_none() {
            return Err(SaleError::ProductNotFound(id));
        }
        if self.ledger.product_in_use(id).await? {
            return Err(SaleError::ProductInUse(id));
        }
        self.catalog.remove_product(id).await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SaleError {
    #[error("customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("sale not found: {0}")]
    SaleNotFound(Uuid),

    #[error("customer {0} still has recorded sales")]
    CustomerHasSales(Uuid),

    #[error("product {0} is referenced by recorded sales")]
    ProductInUse(Uuid),

    #[error("a sale needs at least one item")]
    EmptySale,

    #[error("quantity for product {product_id} must be positive, got {quantity}")]
    InvalidQuantity { product_id: Uuid, quantity: i64 },

    #[error("unit price override for product {product_id} must not be negative")]
    InvalidPrice { product_id: Uuid },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SaleError {
    /// A guard that fires inside the storage transaction surfaces exactly
    /// like one caught in the read-only pass.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CustomerNotFound(id) => SaleError::CustomerNotFound(id),
            StoreError::ProductNotFound(id) => SaleError::ProductNotFound(id),
            StoreError::SaleNotFound(id) => SaleError::SaleNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => SaleError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => SaleError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercato_catalog::Product;
    use mercato_parties::{Customer, CustomerType};
    use mercato_store::MemoryStore;

    use crate::models::RequestedItem;

    async fn setup() -> (SaleEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = SaleEngine::new(store.clone(), store.clone(), store.clone());
        (engine, store)
    }

    async fn seed_customer(store: &MemoryStore) -> Customer {
        let customer = Customer::new("Ana Souza", CustomerType::Individual);
        store.save_customer(&customer).await.unwrap();
        customer
    }

    async fn seed_product(store: &MemoryStore, price_cents: i64, stock: i64) -> Product {
        let product = Product::new("Espresso Beans 1kg", price_cents, stock, Uuid::new_v4().to_string());
        store.save_product(&product).await.unwrap();
        product
    }

    async fn stock_of(store: &MemoryStore, id: Uuid) -> i64 {
        store.find_product(id).await.unwrap().unwrap().stock_quantity
    }

    fn one_item(product_id: Uuid, quantity: i64) -> SaleRequest {
        SaleRequest {
            customer_id: Uuid::nil(),
            sale_date: None,
            items: vec![RequestedItem {
                product_id,
                quantity,
                unit_price_cents: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_decrements_stock_and_totals() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let mut request = one_item(product.id, 3);
        request.customer_id = customer.id;
        let sale = engine.create_sale(request).await.unwrap();

        assert_eq!(sale.total_cents, 1500);
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].unit_price_cents, 500);
        assert_eq!(stock_of(&store, product.id).await, 7);
        assert!(store.find_sale(sale.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_untouched() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 2).await;

        let mut request = one_item(product.id, 5);
        request.customer_id = customer.id;
        let err = engine.create_sale(request).await.unwrap_err();

        match err {
            SaleError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&store, product.id).await, 2);
        assert!(store.list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_removes_sale() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let mut request = one_item(product.id, 3);
        request.customer_id = customer.id;
        let sale = engine.create_sale(request).await.unwrap();
        assert_eq!(stock_of(&store, product.id).await, 7);

        engine.cancel_sale(sale.id).await.unwrap();

        assert_eq!(stock_of(&store, product.id).await, 10);
        assert!(store.find_sale(sale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_customer_touches_no_stock() {
        let (engine, store) = setup().await;
        let product = seed_product(&store, 500, 10).await;

        let request = one_item(product.id, 3); // customer_id stays nil
        let err = engine.create_sale(request).await.unwrap_err();

        assert!(matches!(err, SaleError::CustomerNotFound(_)));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn test_later_item_failure_rolls_back_earlier_items() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let plenty = seed_product(&store, 500, 10).await;
        let scarce = seed_product(&store, 300, 1).await;

        let request = SaleRequest {
            customer_id: customer.id,
            sale_date: None,
            items: vec![
                RequestedItem {
                    product_id: plenty.id,
                    quantity: 2,
                    unit_price_cents: None,
                },
                RequestedItem {
                    product_id: scarce.id,
                    quantity: 4,
                    unit_price_cents: None,
                },
            ],
        };
        let err = engine.create_sale(request).await.unwrap_err();

        assert!(matches!(err, SaleError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, plenty.id).await, 10);
        assert_eq!(stock_of(&store, scarce.id).await, 1);
        assert!(store.list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_product_lines_are_checked_against_combined_quantity() {
        // Each line passes the read-only check on its own; only the
        // transactional guard sees their sum.
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let request = SaleRequest {
            customer_id: customer.id,
            sale_date: None,
            items: vec![
                RequestedItem {
                    product_id: product.id,
                    quantity: 6,
                    unit_price_cents: None,
                },
                RequestedItem {
                    product_id: product.id,
                    quantity: 6,
                    unit_price_cents: None,
                },
            ],
        };
        let err = engine.create_sale(request).await.unwrap_err();

        assert!(matches!(err, SaleError::InsufficientStock { .. }));
        assert_eq!(stock_of(&store, product.id).await, 10);
        assert!(store.list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_override_and_snapshot() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let request = SaleRequest {
            customer_id: customer.id,
            sale_date: None,
            items: vec![RequestedItem {
                product_id: product.id,
                quantity: 2,
                unit_price_cents: Some(450),
            }],
        };
        let sale = engine.create_sale(request).await.unwrap();
        assert_eq!(sale.total_cents, 900);

        // Raising the product price later never touches the recorded sale.
        let mut repriced = store.find_product(product.id).await.unwrap().unwrap();
        repriced.price_cents = 999;
        store.save_product(&repriced).await.unwrap();

        let stored = store.find_sale(sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items[0].unit_price_cents, 450);
        assert_eq!(stored.total_cents, 900);
    }

    #[tokio::test]
    async fn test_empty_and_invalid_requests_are_rejected() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let empty = SaleRequest {
            customer_id: customer.id,
            sale_date: None,
            items: vec![],
        };
        assert!(matches!(engine.create_sale(empty).await.unwrap_err(), SaleError::EmptySale));

        let mut zero_quantity = one_item(product.id, 0);
        zero_quantity.customer_id = customer.id;
        assert!(matches!(
            engine.create_sale(zero_quantity).await.unwrap_err(),
            SaleError::InvalidQuantity { .. }
        ));

        let negative_price = SaleRequest {
            customer_id: customer.id,
            sale_date: None,
            items: vec![RequestedItem {
                product_id: product.id,
                quantity: 1,
                unit_price_cents: Some(-10),
            }],
        };
        assert!(matches!(
            engine.create_sale(negative_price).await.unwrap_err(),
            SaleError::InvalidPrice { .. }
        ));
        assert_eq!(stock_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale() {
        let (engine, _store) = setup().await;
        let err = engine.cancel_sale(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SaleError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn test_customer_delete_is_guarded_and_cascade_restores_stock() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let mut request = one_item(product.id, 4);
        request.customer_id = customer.id;
        engine.create_sale(request).await.unwrap();

        let err = engine.delete_customer(customer.id, false).await.unwrap_err();
        assert!(matches!(err, SaleError::CustomerHasSales(_)));
        assert!(store.find_customer(customer.id).await.unwrap().is_some());

        engine.delete_customer(customer.id, true).await.unwrap();
        assert!(store.find_customer(customer.id).await.unwrap().is_none());
        assert_eq!(stock_of(&store, product.id).await, 10);
        assert!(store.list_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_product_delete_is_guarded_while_referenced() {
        let (engine, store) = setup().await;
        let customer = seed_customer(&store).await;
        let product = seed_product(&store, 500, 10).await;

        let mut request = one_item(product.id, 1);
        request.customer_id = customer.id;
        let sale = engine.create_sale(request).await.unwrap();

        let err = engine.delete_product(product.id).await.unwrap_err();
        assert!(matches!(err, SaleError::ProductInUse(_)));

        engine.cancel_sale(sale.id).await.unwrap();
        engine.delete_product(product.id).await.unwrap();
        assert!(store.find_product(product.id).await.unwrap().is_none());
    }
}

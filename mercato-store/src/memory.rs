use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use mercato_catalog::{checked_adjust, Product, ProductCatalog, StockDelta};
use mercato_core::StoreError;
use mercato_parties::{Customer, CustomerDirectory, CustomerType};
use mercato_sales::{Sale, SaleLedger};

/// In-memory storage backend: the default when no database is configured,
/// and the backend every test runs against.
///
/// One lock over the whole dataset, so writers serialize and a commit or
/// revoke is atomic by construction: every delta is validated before the
/// first mutation is applied, all under the same write guard.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    customers: HashMap<Uuid, Customer>,
    products: HashMap<Uuid, Product>,
    sales: HashMap<Uuid, Sale>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    /// Validate every delta against current stock, then apply them all.
    /// The staging map also folds together several deltas for the same
    /// product, so a batch is judged by its combined quantity.
    fn apply_deltas(&mut self, deltas: &[StockDelta]) -> Result<(), StoreError> {
        let mut staged: HashMap<Uuid, i64> = HashMap::new();
        for delta in deltas {
            let current = match staged.get(&delta.product_id) {
                Some(quantity) => *quantity,
                None => {
                    self.products
                        .get(&delta.product_id)
                        .ok_or(StoreError::ProductNotFound(delta.product_id))?
                        .stock_quantity
                }
            };
            let next = checked_adjust(delta.product_id, current, delta.delta)?;
            staged.insert(delta.product_id, next);
        }
        for (id, quantity) in staged {
            if let Some(product) = self.products.get_mut(&id) {
                product.stock_quantity = quantity;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for MemoryStore {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.inner.read().await.customers.get(&id).cloned())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let inner = self.inner.read().await;
        let mut customers: Vec<Customer> = inner.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn list_customers_by_type(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<Customer>, StoreError> {
        let inner = self.inner.read().await;
        let mut customers: Vec<Customer> = inner
            .customers
            .values()
            .filter(|customer| customer.customer_type == customer_type)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(customers)
    }

    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .customers
            .insert(customer.id, customer.clone());
        Ok(())
    }

    async fn remove_customer(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.customers.remove(&id).is_some())
    }
}

#[async_trait]
impl ProductCatalog for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .products
            .values()
            .find(|product| product.barcode == barcode)
            .cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let taken = inner
            .products
            .values()
            .any(|existing| existing.barcode == product.barcode && existing.id != product.id);
        if taken {
            return Err(StoreError::BarcodeTaken(product.barcode.clone()));
        }
        inner.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.products.remove(&id).is_some())
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        let next = checked_adjust(id, product.stock_quantity, delta)?;
        product.stock_quantity = next;
        Ok(next)
    }
}

#[async_trait]
impl SaleLedger for MemoryStore {
    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, StoreError> {
        Ok(self.inner.read().await.sales.get(&id).cloned())
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let inner = self.inner.read().await;
        let mut sales: Vec<Sale> = inner.sales.values().cloned().collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn find_sales_by_customer(&self, customer_id: Uuid) -> Result<Vec<Sale>, StoreError> {
        let inner = self.inner.read().await;
        let mut sales: Vec<Sale> = inner
            .sales
            .values()
            .filter(|sale| sale.customer_id == customer_id)
            .cloned()
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sales)
    }

    async fn product_in_use(&self, product_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .sales
            .values()
            .any(|sale| sale.items.iter().any(|item| item.product_id == product_id)))
    }

    async fn commit_sale(&self, sale: &Sale, deltas: &[StockDelta]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.apply_deltas(deltas)?;
        inner.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn revoke_sale(&self, id: Uuid, restores: &[StockDelta]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sales.contains_key(&id) {
            return Err(StoreError::SaleNotFound(id));
        }
        inner.apply_deltas(restores)?;
        inner.sales.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mercato_sales::SaleItem;

    fn product(stock: i64) -> Product {
        Product::new("Filter Coffee 500g", 250, stock, Uuid::new_v4().to_string())
    }

    fn sale_for(product_id: Uuid, quantity: i64) -> Sale {
        Sale::assemble(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            vec![SaleItem {
                id: Uuid::new_v4(),
                product_id,
                quantity,
                unit_price_cents: 250,
            }],
        )
    }

    #[tokio::test]
    async fn test_adjust_stock_guard() {
        let store = MemoryStore::new();
        let item = product(10);
        store.save_product(&item).await.unwrap();

        assert_eq!(store.adjust_stock(item.id, -4).await.unwrap(), 6);
        assert_eq!(store.adjust_stock(item.id, 4).await.unwrap(), 10);

        let err = store.adjust_stock(item.id, -11).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { .. }));
        assert_eq!(
            store.find_product(item.id).await.unwrap().unwrap().stock_quantity,
            10
        );
    }

    #[tokio::test]
    async fn test_adjust_stock_unknown_product() {
        let store = MemoryStore::new();
        let err = store.adjust_stock(Uuid::new_v4(), 5).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_barcode_must_be_unique() {
        let store = MemoryStore::new();
        let first = Product::new("A", 100, 1, "789000000001");
        store.save_product(&first).await.unwrap();

        let second = Product::new("B", 100, 1, "789000000001");
        let err = store.save_product(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::BarcodeTaken(_)));

        // Re-saving the same product under its own barcode is fine.
        store.save_product(&first).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let plenty = product(10);
        let missing_id = Uuid::new_v4();
        store.save_product(&plenty).await.unwrap();

        let sale = sale_for(plenty.id, 2);
        let deltas = vec![
            StockDelta::new(plenty.id, -2),
            StockDelta::new(missing_id, -1),
        ];
        let err = store.commit_sale(&sale, &deltas).await.unwrap_err();

        assert!(matches!(err, StoreError::ProductNotFound(_)));
        assert_eq!(
            store.find_product(plenty.id).await.unwrap().unwrap().stock_quantity,
            10
        );
        assert!(store.find_sale(sale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_folds_deltas_for_the_same_product() {
        let store = MemoryStore::new();
        let item = product(10);
        store.save_product(&item).await.unwrap();

        let sale = sale_for(item.id, 12);
        let deltas = vec![StockDelta::new(item.id, -6), StockDelta::new(item.id, -6)];
        let err = store.commit_sale(&sale, &deltas).await.unwrap_err();

        assert!(matches!(err, StoreError::InsufficientStock { .. }));
        assert_eq!(
            store.find_product(item.id).await.unwrap().unwrap().stock_quantity,
            10
        );
    }

    #[tokio::test]
    async fn test_revoke_unknown_sale() {
        let store = MemoryStore::new();
        let err = store.revoke_sale(Uuid::new_v4(), &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::SaleNotFound(_)));
    }

    #[tokio::test]
    async fn test_commit_then_revoke_round_trips_stock() {
        let store = MemoryStore::new();
        let item = product(10);
        store.save_product(&item).await.unwrap();

        let sale = sale_for(item.id, 3);
        store
            .commit_sale(&sale, &[StockDelta::new(item.id, -3)])
            .await
            .unwrap();
        assert_eq!(
            store.find_product(item.id).await.unwrap().unwrap().stock_quantity,
            7
        );

        store
            .revoke_sale(sale.id, &[StockDelta::new(item.id, 3)])
            .await
            .unwrap();
        assert_eq!(
            store.find_product(item.id).await.unwrap().unwrap().stock_quantity,
            10
        );
        assert!(store.find_sale(sale.id).await.unwrap().is_none());
    }
}

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use mercato_catalog::{Product, ProductCatalog, StockDelta};
use mercato_core::StoreError;
use mercato_parties::{Customer, CustomerDirectory, CustomerType};
use mercato_sales::{Sale, SaleItem, SaleLedger};

/// PostgreSQL storage backend.
///
/// Commit and revoke run as one transaction; the guarded stock UPDATE takes
/// a row lock, so concurrent sales competing for the last units of a
/// product serialize on that row and cannot oversubscribe it.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

/// Postgres unique_violation; with upserts keyed on id, the only unique
/// constraint left to trip is the product barcode.
const UNIQUE_VIOLATION: &str = "23505";

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    customer_type: String,
}

impl CustomerRow {
    fn into_customer(self) -> Result<Customer, StoreError> {
        let customer_type: CustomerType = self
            .customer_type
            .parse()
            .map_err(|err: String| StoreError::Backend(anyhow!(err)))?;
        Ok(Customer {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            customer_type,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price_cents: i64,
    stock_quantity: i64,
    barcode: String,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            stock_quantity: row.stock_quantity,
            barcode: row.barcode,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleRow {
    id: Uuid,
    sale_date: chrono::NaiveDate,
    total_cents: i64,
    customer_id: Uuid,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct SaleItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i64,
    unit_price_cents: i64,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
        }
    }
}

/// Apply one stock delta inside `tx`. The guarded UPDATE refuses to go
/// below zero; when it matches no row, a follow-up SELECT distinguishes a
/// missing product from a refused decrement.
async fn adjust_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    delta: &StockDelta,
) -> Result<i64, StoreError> {
    let updated: Option<(i64,)> = sqlx::query_as(
        "UPDATE products SET stock_quantity = stock_quantity + $2 \
         WHERE id = $1 AND stock_quantity + $2 >= 0 \
         RETURNING stock_quantity",
    )
    .bind(delta.product_id)
    .bind(delta.delta)
    .fetch_optional(&mut **tx)
    .await
    .map_err(backend)?;

    if let Some((quantity,)) = updated {
        return Ok(quantity);
    }

    let available: Option<(i64,)> =
        sqlx::query_as("SELECT stock_quantity FROM products WHERE id = $1")
            .bind(delta.product_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend)?;

    match available {
        None => Err(StoreError::ProductNotFound(delta.product_id)),
        Some((available,)) => Err(StoreError::InsufficientStock {
            product_id: delta.product_id,
            requested: -delta.delta,
            available,
        }),
    }
}

#[async_trait]
impl CustomerDirectory for PgStore {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email, phone, address, customer_type FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(CustomerRow::into_customer).transpose()
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email, phone, address, customer_type FROM customers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(CustomerRow::into_customer).collect()
    }

    async fn list_customers_by_type(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<Customer>, StoreError> {
        let rows = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email, phone, address, customer_type FROM customers \
             WHERE customer_type = $1 ORDER BY name",
        )
        .bind(customer_type.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(CustomerRow::into_customer).collect()
    }

    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO customers (id, name, email, phone, address, customer_type) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
             name = $2, email = $3, phone = $4, address = $5, customer_type = $6",
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(customer.customer_type.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn remove_customer(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductCatalog for PgStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price_cents, stock_quantity, barcode \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Product::from))
    }

    async fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price_cents, stock_quantity, barcode \
             FROM products WHERE barcode = $1",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, description, price_cents, stock_quantity, barcode \
             FROM products ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO products (id, name, description, price_cents, stock_quantity, barcode) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
             name = $2, description = $3, price_cents = $4, stock_quantity = $5, barcode = $6",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock_quantity)
        .bind(&product.barcode)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(StoreError::BarcodeTaken(product.barcode.clone()))
            }
            Err(err) => Err(backend(err)),
        }
    }

    async fn remove_product(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i64) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let new_quantity = adjust_in_tx(&mut tx, &StockDelta::new(id, delta)).await?;
        tx.commit().await.map_err(backend)?;
        Ok(new_quantity)
    }
}

impl PgStore {
    async fn load_items(&self, sale_id: Uuid) -> Result<Vec<SaleItem>, StoreError> {
        let rows = sqlx::query_as::<_, SaleItemRow>(
            "SELECT id, product_id, quantity, unit_price_cents \
             FROM sale_items WHERE sale_id = $1 ORDER BY position",
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(SaleItem::from).collect())
    }

    async fn load_sale(&self, row: SaleRow) -> Result<Sale, StoreError> {
        let items = self.load_items(row.id).await?;
        Ok(Sale {
            id: row.id,
            sale_date: row.sale_date,
            total_cents: row.total_cents,
            customer_id: row.customer_id,
            items,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SaleLedger for PgStore {
    async fn find_sale(&self, id: Uuid) -> Result<Option<Sale>, StoreError> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_date, total_cents, customer_id, created_at FROM sales WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => Ok(Some(self.load_sale(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_sales(&self) -> Result<Vec<Sale>, StoreError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_date, total_cents, customer_id, created_at \
             FROM sales ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(self.load_sale(row).await?);
        }
        Ok(sales)
    }

    async fn find_sales_by_customer(&self, customer_id: Uuid) -> Result<Vec<Sale>, StoreError> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, sale_date, total_cents, customer_id, created_at \
             FROM sales WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            sales.push(self.load_sale(row).await?);
        }
        Ok(sales)
    }

    async fn product_in_use(&self, product_id: Uuid) -> Result<bool, StoreError> {
        let in_use: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sale_items WHERE product_id = $1)",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(in_use)
    }

    async fn commit_sale(&self, sale: &Sale, deltas: &[StockDelta]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // An early return drops the transaction, rolling back every
        // decrement applied so far.
        for delta in deltas {
            adjust_in_tx(&mut tx, delta).await?;
        }

        sqlx::query(
            "INSERT INTO sales (id, sale_date, total_cents, customer_id, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(sale.id)
        .bind(sale.sale_date)
        .bind(sale.total_cents)
        .bind(sale.customer_id)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for (position, item) in sale.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO sale_items (id, sale_id, product_id, quantity, unit_price_cents, position) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(sale.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn revoke_sale(&self, id: Uuid, restores: &[StockDelta]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for delta in restores {
            adjust_in_tx(&mut tx, delta).await?;
        }

        sqlx::query("DELETE FROM sale_items WHERE sale_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let result = sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls the restores back.
            return Err(StoreError::SaleNotFound(id));
        }

        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use mercato_core::StoreError;

use crate::customer::{Customer, CustomerType};

/// Repository trait for customer data access.
///
/// No business rules live here beyond existence checks. The deletion guard
/// (a customer with recorded sales cannot be silently removed) belongs to
/// the sale engine, which owns the cross-entity invariants.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError>;

    async fn list_customers_by_type(
        &self,
        customer_type: CustomerType,
    ) -> Result<Vec<Customer>, StoreError>;

    /// Insert or replace; the id on the record is authoritative.
    async fn save_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    /// Returns false when no such customer exists.
    async fn remove_customer(&self, id: Uuid) -> Result<bool, StoreError>;
}

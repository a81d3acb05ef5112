use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A completed order event consuming stock: the single source of truth for
/// what was sold, to whom, at what snapshotted prices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub sale_date: NaiveDate,
    /// Total in cents. Equals the sum over items of quantity times unit
    /// price, fixed at creation time and never recomputed.
    pub total_cents: i64,
    pub customer_id: Uuid,
    /// Owned by the sale; items cannot outlive it.
    pub items: Vec<SaleItem>,
    pub created_at: DateTime<Utc>,
}

/// A single line of a sale. `unit_price_cents` is the price at the time of
/// sale; later product price changes never touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl SaleItem {
    pub fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

impl Sale {
    /// Assemble a sale from snapshotted items, computing the total in item
    /// order.
    pub fn assemble(customer_id: Uuid, sale_date: NaiveDate, items: Vec<SaleItem>) -> Self {
        let total_cents = items.iter().map(SaleItem::line_total_cents).sum();
        Self {
            id: Uuid::new_v4(),
            sale_date,
            total_cents,
            customer_id,
            items,
            created_at: Utc::now(),
        }
    }
}

/// Engine input for a new sale. Optional fields default inside the engine:
/// the date to today, each unit price to the product's current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub customer_id: Uuid,
    pub sale_date: Option<NaiveDate>,
    pub items: Vec<RequestedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, unit_price_cents: i64) -> SaleItem {
        SaleItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let sale = Sale::assemble(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            vec![item(3, 500), item(2, 120)],
        );
        assert_eq!(sale.total_cents, 3 * 500 + 2 * 120);
    }

    #[test]
    fn test_empty_sale_totals_zero() {
        let sale = Sale::assemble(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            vec![],
        );
        assert_eq!(sale.total_cents, 0);
    }
}

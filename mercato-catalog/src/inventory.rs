use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mercato_core::StoreError;

/// A pending stock mutation: negative for a sale, positive for a
/// cancellation or restock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockDelta {
    pub product_id: Uuid,
    pub delta: i64,
}

impl StockDelta {
    pub fn new(product_id: Uuid, delta: i64) -> Self {
        Self { product_id, delta }
    }
}

/// Non-negativity guard shared by every storage backend: the new quantity
/// for `delta` applied to `current`, refusing to go below zero.
pub fn checked_adjust(product_id: Uuid, current: i64, delta: i64) -> Result<i64, StoreError> {
    let next = current + delta;
    if next < 0 {
        return Err(StoreError::InsufficientStock {
            product_id,
            requested: -delta,
            available: current,
        });
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_within_stock() {
        let id = Uuid::new_v4();
        assert_eq!(checked_adjust(id, 10, -3).unwrap(), 7);
        assert_eq!(checked_adjust(id, 7, 3).unwrap(), 10);
    }

    #[test]
    fn test_adjust_to_exactly_zero() {
        let id = Uuid::new_v4();
        assert_eq!(checked_adjust(id, 5, -5).unwrap(), 0);
    }

    #[test]
    fn test_adjust_below_zero_is_refused() {
        let id = Uuid::new_v4();
        let err = checked_adjust(id, 2, -5).unwrap_err();
        match err {
            StoreError::InsufficientStock { requested, available, .. } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }
}

use serde::{Deserialize, Serialize};

use eafoods_core::{DomainError, DomainResult, ValueObject};

use crate::preorder::PreorderSnapshot;

/// Derived availability of a product at decision time.
///
/// `available = stock - reserved`, where `reserved` sums the quantities of all
/// PENDING and CONFIRMED preorders. Cancelled preorders free their quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub stock: i64,
    pub reserved: i64,
}

impl ValueObject for Availability {}

impl Availability {
    pub fn new(stock: i64, reserved: i64) -> Self {
        Self { stock, reserved }
    }

    /// Sum the active preorders against `stock`.
    pub fn from_preorders<'a>(
        stock: i64,
        preorders: impl IntoIterator<Item = &'a PreorderSnapshot>,
    ) -> Self {
        let reserved = preorders
            .into_iter()
            .filter(|p| p.status.is_active())
            .map(|p| p.quantity)
            .sum();
        Self { stock, reserved }
    }

    /// Quantity still free, never below zero.
    ///
    /// Stock may be replaced below what is already reserved.
    pub fn available(&self) -> i64 {
        (self.stock - self.reserved).max(0)
    }

    pub fn ensure(&self, requested: i64) -> DomainResult<()> {
        let available = self.available();
        if requested > available {
            return Err(DomainError::insufficient_stock(requested, available));
        }
        Ok(())
    }
}

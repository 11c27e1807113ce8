//! Repacking records as seen by the FIFO allocator

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A repacking record's consumable quantity
///
/// `remaining_qty` is decremented by FIFO consumption and incremented by
/// restoration. It must stay within `0..=repack_quantity`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepackingLot {
    pub id: Uuid,
    pub repack_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub repack_quantity: Decimal,
    pub remaining_qty: Decimal,
}

impl RepackingLot {
    /// Quantity already consumed from this record, i.e. how much can be restored
    pub fn headroom(&self) -> Decimal {
        (self.repack_quantity - self.remaining_qty).max(Decimal::ZERO)
    }
}

/// Quantity taken from (or given back to) one repacking record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub lot_id: Uuid,
    pub quantity: Decimal,
}

/// Result of planning a LIFO restoration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestorationPlan {
    pub allocations: Vec<Allocation>,
    pub restored: Decimal,
    /// Amount no record had headroom for (legacy rows created before tracking)
    pub unrestored: Decimal,
}

impl RestorationPlan {
    pub fn is_complete(&self) -> bool {
        self.unrestored.is_zero()
    }
}

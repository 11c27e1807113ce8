//! FIFO consumption and LIFO restoration over repacking records
//!
//! Both planners are pure: they take a snapshot of the records and return
//! the per-record quantities to apply. The caller writes the plan back to
//! storage inside its own transaction. Consumption is all-or-nothing: the
//! availability check runs before any allocation is produced.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Allocation, RepackingLot, RestorationPlan};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AllocationError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("insufficient repacked stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },
}

/// Total unconsumed quantity across the records
pub fn available_quantity(lots: &[RepackingLot]) -> Decimal {
    lots.iter()
        .map(|lot| lot.remaining_qty)
        .filter(|qty| *qty > Decimal::ZERO)
        .sum()
}

fn oldest_first(lots: &[RepackingLot]) -> Vec<&RepackingLot> {
    let mut ordered: Vec<&RepackingLot> = lots.iter().collect();
    ordered.sort_by(|a, b| {
        a.repack_date
            .cmp(&b.repack_date)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    ordered
}

/// Plan consumption of `requested` from the oldest records first
pub fn plan_fifo_consumption(
    lots: &[RepackingLot],
    requested: Decimal,
) -> Result<Vec<Allocation>, AllocationError> {
    if requested <= Decimal::ZERO {
        return Err(AllocationError::NonPositiveQuantity(requested));
    }

    let available = available_quantity(lots);
    if available < requested {
        return Err(AllocationError::InsufficientStock {
            requested,
            available,
        });
    }

    let mut allocations = Vec::new();
    let mut outstanding = requested;

    for lot in oldest_first(lots) {
        if outstanding <= Decimal::ZERO {
            break;
        }
        if lot.remaining_qty <= Decimal::ZERO {
            continue;
        }

        let take = outstanding.min(lot.remaining_qty);
        allocations.push(Allocation {
            lot_id: lot.id,
            quantity: take,
        });
        outstanding -= take;
    }

    Ok(allocations)
}

/// Plan restoration of `amount` into the newest records first
///
/// Each record receives at most its consumed headroom. Whatever cannot be
/// placed is reported as `unrestored` rather than failing.
pub fn plan_lifo_restoration(
    lots: &[RepackingLot],
    amount: Decimal,
) -> Result<RestorationPlan, AllocationError> {
    if amount <= Decimal::ZERO {
        return Err(AllocationError::NonPositiveQuantity(amount));
    }

    let mut allocations = Vec::new();
    let mut outstanding = amount;

    for lot in oldest_first(lots).into_iter().rev() {
        if outstanding <= Decimal::ZERO {
            break;
        }
        let headroom = lot.headroom();
        if headroom <= Decimal::ZERO {
            continue;
        }

        let give = outstanding.min(headroom);
        allocations.push(Allocation {
            lot_id: lot.id,
            quantity: give,
        });
        outstanding -= give;
    }

    Ok(RestorationPlan {
        allocations,
        restored: amount - outstanding,
        unrestored: outstanding,
    })
}

/// Apply a consumption plan to an in-memory snapshot
pub fn apply_consumption(lots: &mut [RepackingLot], allocations: &[Allocation]) {
    for allocation in allocations {
        if let Some(lot) = lots.iter_mut().find(|l| l.id == allocation.lot_id) {
            lot.remaining_qty -= allocation.quantity;
        }
    }
}

/// Apply a restoration plan to an in-memory snapshot
pub fn apply_restoration(lots: &mut [RepackingLot], plan: &RestorationPlan) {
    for allocation in &plan.allocations {
        if let Some(lot) = lots.iter_mut().find(|l| l.id == allocation.lot_id) {
            lot.remaining_qty = (lot.remaining_qty + allocation.quantity).min(lot.repack_quantity);
        }
    }
}

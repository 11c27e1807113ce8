//! Cost, pricing and material requirement calculations

use rust_decimal::Decimal;

use crate::models::{BomComponent, MaterialRequirement, QuotationLine, QuotationTotals};

/// Weighted average unit cost after receiving stock
///
/// A negative on-hand quantity (possible with legacy data) is treated as
/// zero so the incoming cost is not distorted.
pub fn weighted_average_cost(
    current_qty: Decimal,
    current_cost: Decimal,
    incoming_qty: Decimal,
    incoming_cost: Decimal,
) -> Decimal {
    let current_qty = current_qty.max(Decimal::ZERO);
    let total_qty = current_qty + incoming_qty;
    if total_qty <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((current_qty * current_cost + incoming_qty * incoming_cost) / total_qty).round_dp(4)
}

/// Source packs consumed to build `bundle_quantity` bundles
pub fn bundle_source_quantity(bundle_quantity: Decimal, packs_per_bundle: i32) -> Decimal {
    bundle_quantity * Decimal::from(packs_per_bundle)
}

/// Scale a bill of materials to a production quantity
pub fn material_requirements(components: &[BomComponent], units: Decimal) -> Vec<MaterialRequirement> {
    components
        .iter()
        .map(|c| MaterialRequirement {
            component_item_id: c.component_item_id,
            required_quantity: (c.quantity_per_unit * units).round_dp(4),
        })
        .collect()
}

/// Quotation subtotal, discount and grand total
pub fn quotation_totals(lines: &[QuotationLine], discount_percent: Decimal) -> QuotationTotals {
    let subtotal: Decimal = lines.iter().map(QuotationLine::line_total).sum();
    let discount_amount = (subtotal * discount_percent / Decimal::ONE_HUNDRED).round_dp(2);
    QuotationTotals {
        subtotal,
        discount_amount,
        total: subtotal - discount_amount,
    }
}

//! WebAssembly module for the Stock Ledger Platform
//!
//! Provides client-side previews for:
//! - Trolley weigh-in verification
//! - Bundle source quantities and FIFO allocation
//! - Quotation totals
//! - Weighted average cost

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Evaluate a weigh-in before it is submitted
///
/// Returns the verification outcome as JSON.
#[wasm_bindgen]
pub fn preview_weigh_in(
    expected_units: i32,
    actual_units: i32,
    unit_weight: &str,
    actual_weight: &str,
    tolerance_percent: &str,
) -> Result<String, JsValue> {
    let reading = WeighIn {
        expected_units,
        actual_units,
        expected_weight: shared::expected_weight(
            expected_units,
            parse_decimal("unit weight", unit_weight)?,
        ),
        actual_weight: parse_decimal("actual weight", actual_weight)?,
        tolerance_percent: parse_decimal("tolerance", tolerance_percent)?,
    };

    to_json(&shared::evaluate_weigh_in(&reading))
}

/// Source packs a bundle run will consume
#[wasm_bindgen]
pub fn calculate_bundle_source_quantity(
    bundle_quantity: &str,
    packs_per_bundle: i32,
) -> Result<String, JsValue> {
    validate_packs_per_bundle(packs_per_bundle).map_err(JsValue::from_str)?;
    let bundles = parse_decimal("bundle quantity", bundle_quantity)?;
    Ok(shared::bundle_source_quantity(bundles, packs_per_bundle).to_string())
}

/// Plan FIFO consumption over repacking records supplied as JSON
///
/// Returns the allocations as JSON, or an error naming the shortfall.
#[wasm_bindgen]
pub fn preview_fifo_allocation(lots_json: &str, requested: &str) -> Result<String, JsValue> {
    let lots: Vec<RepackingLot> = serde_json::from_str(lots_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid repacking JSON: {}", e)))?;
    let requested = parse_decimal("quantity", requested)?;

    let allocations = shared::plan_fifo_consumption(&lots, requested)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_json(&allocations)
}

/// Quotation subtotal, discount and total for lines supplied as JSON
#[wasm_bindgen]
pub fn calculate_quotation_totals(lines_json: &str, discount_percent: &str) -> Result<String, JsValue> {
    let lines: Vec<QuotationLine> = serde_json::from_str(lines_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid lines JSON: {}", e)))?;
    let discount = parse_decimal("discount", discount_percent)?;
    validate_percent(discount).map_err(JsValue::from_str)?;

    to_json(&shared::quotation_totals(&lines, discount))
}

/// Unit cost after a receipt, as the GRN screen shows it
#[wasm_bindgen]
pub fn calculate_weighted_average_cost(
    current_qty: &str,
    current_cost: &str,
    incoming_qty: &str,
    incoming_cost: &str,
) -> Result<String, JsValue> {
    let cost = shared::weighted_average_cost(
        parse_decimal("current quantity", current_qty)?,
        parse_decimal("current cost", current_cost)?,
        parse_decimal("incoming quantity", incoming_qty)?,
        parse_decimal("incoming cost", incoming_cost)?,
    );
    Ok(cost.to_string())
}

/// Validate an item or location code
#[wasm_bindgen]
pub fn is_valid_code(code: &str) -> bool {
    validate_code(code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_weigh_in() {
        let json = preview_weigh_in(40, 40, "0.5", "20.3", "2").unwrap();
        let outcome: VerificationOutcome = serde_json::from_str(&json).unwrap();
        assert!(outcome.passed);

        let json = preview_weigh_in(40, 40, "0.5", "21", "2").unwrap();
        let outcome: VerificationOutcome = serde_json::from_str(&json).unwrap();
        assert!(!outcome.passed);
    }

    #[test]
    fn test_bundle_source_quantity() {
        assert_eq!(calculate_bundle_source_quantity("20", 6).unwrap(), "120");
    }

    #[test]
    fn test_quotation_totals() {
        let lines = r#"[{"quantity":"4","unit_price":"250"}]"#;
        let json = calculate_quotation_totals(lines, "10").unwrap();
        let totals: QuotationTotals = serde_json::from_str(&json).unwrap();
        assert_eq!(totals.total, Decimal::from(900));
    }

    #[test]
    fn test_weighted_average_cost() {
        assert_eq!(
            calculate_weighted_average_cost("100", "20", "50", "30").unwrap(),
            "23.3333"
        );
    }
}

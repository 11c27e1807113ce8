//! Quotation and bill of materials tests
//!
//! Property-based and unit tests for:
//! - Quotation totals and discounts
//! - The quotation workflow
//! - Material requirements for production batches

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    material_requirements, quotation_totals, validate_percent, BomComponent, QuotationLine,
    QuotationStatus,
};
use std::str::FromStr;
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn line(quantity: &str, unit_price: &str) -> QuotationLine {
    QuotationLine {
        quantity: dec(quantity),
        unit_price: dec(unit_price),
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn quotation_status_strategy() -> impl Strategy<Value = QuotationStatus> {
    prop_oneof![
        Just(QuotationStatus::Draft),
        Just(QuotationStatus::Sent),
        Just(QuotationStatus::Accepted),
        Just(QuotationStatus::Rejected),
    ]
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_line_total_rounds_to_cents() {
        assert_eq!(line("3", "33.333").line_total(), dec("100.00"));
    }

    #[test]
    fn test_totals_without_discount() {
        let totals = quotation_totals(&[line("2", "450"), line("1", "99.99")], Decimal::ZERO);
        assert_eq!(totals.subtotal, dec("999.99"));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.total, dec("999.99"));
    }

    #[test]
    fn test_totals_with_discount() {
        let totals = quotation_totals(&[line("4", "250")], dec("12.5"));
        assert_eq!(totals.discount_amount, dec("125.00"));
        assert_eq!(totals.total, dec("875.00"));
    }

    #[test]
    fn test_discount_bounds() {
        assert!(validate_percent(dec("100")).is_ok());
        assert!(validate_percent(dec("100.01")).is_err());
        assert!(validate_percent(dec("-1")).is_err());
    }

    #[test]
    fn test_workflow() {
        assert!(QuotationStatus::Draft.can_transition_to(QuotationStatus::Sent));
        assert!(QuotationStatus::Sent.can_transition_to(QuotationStatus::Accepted));
        assert!(QuotationStatus::Sent.can_transition_to(QuotationStatus::Rejected));

        assert!(!QuotationStatus::Draft.can_transition_to(QuotationStatus::Accepted));
        assert!(!QuotationStatus::Accepted.can_transition_to(QuotationStatus::Rejected));
        assert!(!QuotationStatus::Rejected.can_transition_to(QuotationStatus::Draft));
    }

    /// Bread: 0.4 flour, 0.02 yeast per loaf; 250 loaves
    #[test]
    fn test_batch_material_requirements() {
        let flour = Uuid::new_v4();
        let yeast = Uuid::new_v4();
        let bom = [
            BomComponent { component_item_id: flour, quantity_per_unit: dec("0.4") },
            BomComponent { component_item_id: yeast, quantity_per_unit: dec("0.02") },
        ];

        let needs = material_requirements(&bom, dec("250"));
        assert_eq!(needs.len(), 2);
        assert_eq!(needs[0].component_item_id, flour);
        assert_eq!(needs[0].required_quantity, dec("100"));
        assert_eq!(needs[1].required_quantity, dec("5"));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Subtotal is the sum of rounded line totals and total never exceeds it
    #[test]
    fn prop_totals_consistent(
        lines in prop::collection::vec((1i64..1_000, 0i64..1_000_000), 1..15),
        discount_tenths in 0i64..=1_000,
    ) {
        let lines: Vec<QuotationLine> = lines
            .into_iter()
            .map(|(q, p)| QuotationLine { quantity: Decimal::from(q), unit_price: Decimal::new(p, 2) })
            .collect();
        let totals = quotation_totals(&lines, Decimal::new(discount_tenths, 1));

        let expected: Decimal = lines.iter().map(QuotationLine::line_total).sum();
        prop_assert_eq!(totals.subtotal, expected);
        prop_assert!(totals.total <= totals.subtotal);
        prop_assert!(totals.total >= Decimal::ZERO);
    }

    /// Accepted and rejected quotations are final
    #[test]
    fn prop_terminal_statuses_are_final(next in quotation_status_strategy()) {
        prop_assert!(!QuotationStatus::Accepted.can_transition_to(next));
        prop_assert!(!QuotationStatus::Rejected.can_transition_to(next));
    }

    /// Requirements scale linearly with the batch size
    #[test]
    fn prop_requirements_scale(per_unit in 1i64..10_000, units in 1i64..1_000) {
        let bom = [BomComponent {
            component_item_id: Uuid::new_v4(),
            quantity_per_unit: Decimal::new(per_unit, 4),
        }];
        let single = material_requirements(&bom, Decimal::from(units));
        let double = material_requirements(&bom, Decimal::from(units * 2));
        prop_assert_eq!(double[0].required_quantity, single[0].required_quantity * Decimal::from(2));
    }
}

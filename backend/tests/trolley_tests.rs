//! Trolley transfer tests
//!
//! Property-based and unit tests for:
//! - The weigh-in verification gate
//! - The movement state machine (pending, verified, rejected, completed)
//! - Ledger effects of a verified transfer

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    allowed_weight_variance, evaluate_weigh_in, expected_weight, next_balance, LedgerDelta,
    MovementStatus, WeighIn,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// What the service does with a weigh-in, minus the database
struct Transfer {
    status: MovementStatus,
    production_balance: Decimal,
    store_balance: Decimal,
}

impl Transfer {
    fn loaded(produced: Decimal) -> Self {
        Self {
            status: MovementStatus::Pending,
            production_balance: produced,
            store_balance: Decimal::ZERO,
        }
    }

    fn verify(&mut self, reading: &WeighIn) -> bool {
        let outcome = evaluate_weigh_in(reading);
        if outcome.passed {
            let verified = self.status.transition(MovementStatus::Verified).unwrap();
            let quantity = Decimal::from(reading.expected_units);
            self.production_balance = next_balance(
                self.production_balance,
                &LedgerDelta::outbound(quantity),
                false,
            )
            .unwrap();
            self.store_balance =
                next_balance(self.store_balance, &LedgerDelta::inbound(quantity), false).unwrap();
            self.status = verified.transition(MovementStatus::Completed).unwrap();
        } else {
            self.status = self.status.transition(MovementStatus::Rejected).unwrap();
        }
        outcome.passed
    }
}

fn reading(units: i32, actual_units: i32, unit_weight: &str, actual_weight: &str) -> WeighIn {
    WeighIn {
        expected_units: units,
        actual_units,
        expected_weight: expected_weight(units, dec(unit_weight)),
        actual_weight: dec(actual_weight),
        tolerance_percent: dec("2.0"),
    }
}

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Movement statuses
fn status_strategy() -> impl Strategy<Value = MovementStatus> {
    prop_oneof![
        Just(MovementStatus::Pending),
        Just(MovementStatus::Verified),
        Just(MovementStatus::Rejected),
        Just(MovementStatus::Completed),
    ]
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 40 loaves at 0.5 kg: expected 20 kg, 2% allows 0.4 kg either way
    #[test]
    fn test_passing_weigh_in_moves_stock() {
        let mut transfer = Transfer::loaded(dec("100"));
        assert!(transfer.verify(&reading(40, 40, "0.5", "20.3")));

        assert_eq!(transfer.status, MovementStatus::Completed);
        assert_eq!(transfer.production_balance, dec("60"));
        assert_eq!(transfer.store_balance, dec("40"));
    }

    #[test]
    fn test_failing_weigh_in_moves_nothing() {
        let mut transfer = Transfer::loaded(dec("100"));
        assert!(!transfer.verify(&reading(40, 40, "0.5", "21.0")));

        assert_eq!(transfer.status, MovementStatus::Rejected);
        assert_eq!(transfer.production_balance, dec("100"));
        assert_eq!(transfer.store_balance, Decimal::ZERO);
    }

    #[test]
    fn test_unit_shortfall_is_rejected() {
        let outcome = evaluate_weigh_in(&reading(40, 38, "0.5", "20.0"));
        assert!(!outcome.passed);
        assert_eq!(outcome.unit_variance, -2);
    }

    #[test]
    fn test_rejected_movement_can_be_reweighed() {
        let mut transfer = Transfer::loaded(dec("100"));
        assert!(!transfer.verify(&reading(40, 39, "0.5", "19.5")));

        transfer.status = transfer.status.transition(MovementStatus::Pending).unwrap();
        assert!(transfer.verify(&reading(40, 40, "0.5", "19.7")));
        assert_eq!(transfer.status, MovementStatus::Completed);
        assert_eq!(transfer.store_balance, dec("40"));
    }

    #[test]
    fn test_completed_movement_cannot_be_verified_again() {
        let mut transfer = Transfer::loaded(dec("100"));
        assert!(transfer.verify(&reading(40, 40, "0.5", "20.0")));
        assert!(transfer.status.transition(MovementStatus::Verified).is_err());
        assert!(transfer.status.transition(MovementStatus::Pending).is_err());
    }

    #[test]
    fn test_allowed_variance() {
        assert_eq!(allowed_weight_variance(dec("20"), dec("2")), dec("0.4"));
        assert_eq!(allowed_weight_variance(dec("20"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_zero_tolerance_requires_exact_weight() {
        let mut exact = reading(10, 10, "1.25", "12.5");
        exact.tolerance_percent = Decimal::ZERO;
        assert!(evaluate_weigh_in(&exact).passed);

        exact.actual_weight = dec("12.501");
        assert!(!evaluate_weigh_in(&exact).passed);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A verified transfer leaves two offsetting movements; a rejected one none
    #[test]
    fn prop_transfer_conserves_stock(
        units in 1i32..200,
        grams_per_unit in 100i64..2_000,
        deviation_permille in -50i64..50,
        unit_delta in -2i32..=2,
    ) {
        let unit_weight = Decimal::new(grams_per_unit, 3);
        let expected = expected_weight(units, unit_weight);
        let actual = expected + expected * Decimal::new(deviation_permille, 3);
        let input = WeighIn {
            expected_units: units,
            actual_units: units + unit_delta,
            expected_weight: expected,
            actual_weight: actual,
            tolerance_percent: dec("2"),
        };

        let produced = Decimal::from(units) + Decimal::from(50);
        let mut transfer = Transfer::loaded(produced);
        let passed = transfer.verify(&input);

        prop_assert_eq!(transfer.production_balance + transfer.store_balance, produced);
        if passed {
            prop_assert_eq!(transfer.status, MovementStatus::Completed);
            prop_assert_eq!(transfer.store_balance, Decimal::from(units));
        } else {
            prop_assert_eq!(transfer.status, MovementStatus::Rejected);
            prop_assert_eq!(transfer.store_balance, Decimal::ZERO);
        }
    }

    /// Every transition the state machine allows is one of the four documented edges
    #[test]
    fn prop_only_documented_transitions(from in status_strategy(), to in status_strategy()) {
        let allowed = matches!(
            (from, to),
            (MovementStatus::Pending, MovementStatus::Verified)
                | (MovementStatus::Pending, MovementStatus::Rejected)
                | (MovementStatus::Verified, MovementStatus::Completed)
                | (MovementStatus::Rejected, MovementStatus::Pending)
        );
        prop_assert_eq!(from.transition(to).is_ok(), allowed);
    }
}

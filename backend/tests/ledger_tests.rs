//! Stock ledger tests
//!
//! Property-based and unit tests for:
//! - Running balances as the signed sum of movements
//! - Negative stock prevention
//! - Stock count adjustments, reversals and cache drift
//! - Weighted average cost on receipts

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    cache_drift, count_adjustment, next_balance, running_balance, weighted_average_cost,
    LedgerDelta, LedgerError, LedgerTransactionType,
};
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Signed movements in thousandths, never zero
fn movement_strategy() -> impl Strategy<Value = LedgerDelta> {
    prop_oneof![
        (1i64..100_000).prop_map(|q| LedgerDelta::inbound(Decimal::new(q, 3))),
        (1i64..100_000).prop_map(|q| LedgerDelta::outbound(Decimal::new(q, 3))),
    ]
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_opening_then_consumption() {
        let opening = next_balance(Decimal::ZERO, &LedgerDelta::inbound(dec("250")), false).unwrap();
        let after = next_balance(opening, &LedgerDelta::outbound(dec("75.5")), false).unwrap();
        assert_eq!(after, dec("174.5"));
    }

    #[test]
    fn test_overdraw_rejected_by_default() {
        let err = next_balance(dec("10"), &LedgerDelta::outbound(dec("10.001")), false).unwrap_err();
        assert_eq!(
            err,
            LedgerError::WouldGoNegative {
                balance: dec("10"),
                requested: dec("10.001"),
            }
        );
    }

    #[test]
    fn test_overdraw_allowed_when_configured() {
        let balance = next_balance(dec("10"), &LedgerDelta::outbound(dec("15")), true).unwrap();
        assert_eq!(balance, dec("-5"));
    }

    /// Receipts into an already negative balance are always accepted
    #[test]
    fn test_receipt_into_negative_balance() {
        let balance = next_balance(dec("-5"), &LedgerDelta::inbound(dec("2")), false).unwrap();
        assert_eq!(balance, dec("-3"));
    }

    #[test]
    fn test_zero_movement_rejected() {
        assert!(next_balance(dec("10"), &LedgerDelta::inbound(Decimal::ZERO), false).is_err());
    }

    #[test]
    fn test_stock_count_adjustments() {
        let up = count_adjustment(dec("40"), dec("42.5")).unwrap();
        assert_eq!(up, LedgerDelta::inbound(dec("2.5")));

        let down = count_adjustment(dec("40"), dec("37")).unwrap();
        assert_eq!(down, LedgerDelta::outbound(dec("3")));

        assert!(count_adjustment(dec("40"), dec("40")).is_none());
    }

    #[test]
    fn test_reversal_cancels_movement() {
        let receipt = LedgerDelta::inbound(dec("12"));
        let balance = running_balance([receipt, receipt.reversed()]);
        assert_eq!(balance, Decimal::ZERO);
    }

    #[test]
    fn test_cache_drift() {
        assert_eq!(cache_drift(dec("100"), dec("100")), Decimal::ZERO);
        assert_eq!(cache_drift(dec("95"), dec("100")), dec("-5"));
    }

    #[test]
    fn test_transaction_type_round_trip() {
        for t in [
            LedgerTransactionType::OpeningStock,
            LedgerTransactionType::GrnReceipt,
            LedgerTransactionType::BundleSource,
            LedgerTransactionType::TransferIn,
            LedgerTransactionType::Sale,
            LedgerTransactionType::Reversal,
        ] {
            assert_eq!(LedgerTransactionType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(LedgerTransactionType::from_str("sales_return"), None);
    }

    /// 100 @ 20 on hand, GRN of 50 @ 30
    #[test]
    fn test_grn_reaverages_cost() {
        assert_eq!(
            weighted_average_cost(dec("100"), dec("20"), dec("50"), dec("30")),
            dec("23.3333")
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every accepted row's balance equals the signed sum of all rows so far
    #[test]
    fn prop_balance_is_signed_sum(movements in prop::collection::vec(movement_strategy(), 1..40)) {
        let mut accepted = Vec::new();
        let mut balance = Decimal::ZERO;

        for delta in movements {
            if let Ok(next) = next_balance(balance, &delta, false) {
                accepted.push(delta);
                balance = next;
                prop_assert_eq!(balance, running_balance(accepted.iter().copied()));
            }
        }
        prop_assert!(balance >= Decimal::ZERO);
    }

    /// A stock count always lands the balance exactly on the counted quantity
    #[test]
    fn prop_count_lands_on_counted(balance in 0i64..1_000_000, counted in 0i64..1_000_000) {
        let balance = Decimal::new(balance, 3);
        let counted = Decimal::new(counted, 3);

        let after = match count_adjustment(balance, counted) {
            Some(delta) => next_balance(balance, &delta, false).unwrap(),
            None => balance,
        };
        prop_assert_eq!(after, counted);
    }
}

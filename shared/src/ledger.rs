//! Stock ledger arithmetic
//!
//! The ledger is append-only. A new row's balance is the sum of every prior
//! signed movement for the same item and location plus its own delta.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("movement quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("insufficient stock: balance {balance}, requested {requested}")]
    WouldGoNegative { balance: Decimal, requested: Decimal },
}

/// One movement as stored on a ledger row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LedgerDelta {
    pub quantity_in: Decimal,
    pub quantity_out: Decimal,
}

impl LedgerDelta {
    pub fn inbound(quantity: Decimal) -> Self {
        Self {
            quantity_in: quantity,
            quantity_out: Decimal::ZERO,
        }
    }

    pub fn outbound(quantity: Decimal) -> Self {
        Self {
            quantity_in: Decimal::ZERO,
            quantity_out: quantity,
        }
    }

    /// Build a delta from a signed quantity (positive = in, negative = out)
    pub fn from_signed(quantity: Decimal) -> Self {
        if quantity >= Decimal::ZERO {
            Self::inbound(quantity)
        } else {
            Self::outbound(-quantity)
        }
    }

    pub fn signed(&self) -> Decimal {
        self.quantity_in - self.quantity_out
    }

    /// The delta that cancels this one
    pub fn reversed(&self) -> Self {
        Self {
            quantity_in: self.quantity_out,
            quantity_out: self.quantity_in,
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.signed() < Decimal::ZERO
    }
}

/// Balance after applying every delta in order
pub fn running_balance<I>(deltas: I) -> Decimal
where
    I: IntoIterator<Item = LedgerDelta>,
{
    deltas.into_iter().map(|d| d.signed()).sum()
}

/// Compute the balance a new ledger row will carry
///
/// Outgoing movements may not take the balance below zero unless
/// `allow_negative` is set.
pub fn next_balance(
    prior_balance: Decimal,
    delta: &LedgerDelta,
    allow_negative: bool,
) -> Result<Decimal, LedgerError> {
    if delta.quantity_in < Decimal::ZERO || delta.quantity_out < Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity(delta.signed()));
    }
    if delta.signed().is_zero() {
        return Err(LedgerError::NonPositiveQuantity(Decimal::ZERO));
    }

    let balance = prior_balance + delta.signed();
    if balance < Decimal::ZERO && delta.is_outbound() && !allow_negative {
        return Err(LedgerError::WouldGoNegative {
            balance: prior_balance,
            requested: delta.quantity_out,
        });
    }
    Ok(balance)
}

/// Delta needed to bring a ledger balance to a physically counted quantity
///
/// Returns `None` when the count already matches.
pub fn count_adjustment(ledger_balance: Decimal, counted: Decimal) -> Option<LedgerDelta> {
    let difference = counted - ledger_balance;
    if difference.is_zero() {
        None
    } else {
        Some(LedgerDelta::from_signed(difference))
    }
}

/// Difference between the cached item stock and the ledger sum (cache - ledger)
pub fn cache_drift(cached_stock: Decimal, ledger_total: Decimal) -> Decimal {
    cached_stock - ledger_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inbound_and_outbound_signs() {
        assert_eq!(LedgerDelta::inbound(Decimal::from(5)).signed(), Decimal::from(5));
        assert_eq!(LedgerDelta::outbound(Decimal::from(5)).signed(), Decimal::from(-5));
        assert_eq!(
            LedgerDelta::from_signed(Decimal::from(-3)),
            LedgerDelta::outbound(Decimal::from(3))
        );
    }

    #[test]
    fn test_reversal_cancels() {
        let delta = LedgerDelta::outbound(Decimal::from(12));
        assert_eq!(running_balance([delta, delta.reversed()]), Decimal::ZERO);
    }

    #[test]
    fn test_next_balance_blocks_negative_stock() {
        let err = next_balance(Decimal::from(10), &LedgerDelta::outbound(Decimal::from(11)), false)
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::WouldGoNegative {
                balance: Decimal::from(10),
                requested: Decimal::from(11),
            }
        );

        let allowed = next_balance(Decimal::from(10), &LedgerDelta::outbound(Decimal::from(11)), true);
        assert_eq!(allowed, Ok(Decimal::from(-1)));
    }

    #[test]
    fn test_inbound_on_negative_balance_is_allowed() {
        // legacy negative balances can always be topped up
        let balance = next_balance(Decimal::from(-4), &LedgerDelta::inbound(Decimal::from(1)), false);
        assert_eq!(balance, Ok(Decimal::from(-3)));
    }

    #[test]
    fn test_zero_movement_rejected() {
        assert!(next_balance(Decimal::ONE, &LedgerDelta::inbound(Decimal::ZERO), false).is_err());
    }

    #[test]
    fn test_count_adjustment() {
        assert_eq!(count_adjustment(Decimal::from(40), Decimal::from(40)), None);
        assert_eq!(
            count_adjustment(Decimal::from(40), Decimal::from(37)),
            Some(LedgerDelta::outbound(Decimal::from(3)))
        );
        assert_eq!(
            count_adjustment(Decimal::from(40), Decimal::from(42)),
            Some(LedgerDelta::inbound(Decimal::from(2)))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Balance after N entries equals the sum of every signed quantity so far
        #[test]
        fn prop_balance_is_signed_sum(
            movements in prop::collection::vec(-500i64..500, 1..30)
        ) {
            let mut balance = Decimal::ZERO;
            let mut deltas = Vec::new();
            for m in movements.iter().filter(|m| **m != 0) {
                let delta = LedgerDelta::from_signed(Decimal::from(*m));
                balance = next_balance(balance, &delta, true).unwrap();
                deltas.push(delta);
                prop_assert_eq!(balance, running_balance(deltas.iter().copied()));
            }
            let expected: i64 = movements.iter().sum();
            prop_assert_eq!(balance, Decimal::from(expected));
        }

        /// With negatives disallowed, the balance never drops below zero
        #[test]
        fn prop_balance_never_negative(
            movements in prop::collection::vec(-100i64..100, 1..30)
        ) {
            let mut balance = Decimal::ZERO;
            for m in movements.iter().filter(|m| **m != 0) {
                let delta = LedgerDelta::from_signed(Decimal::from(*m));
                if let Ok(next) = next_balance(balance, &delta, false) {
                    balance = next;
                }
                prop_assert!(balance >= Decimal::ZERO);
            }
        }

        /// Applying a count adjustment lands exactly on the counted quantity
        #[test]
        fn prop_count_adjustment_lands_on_count(
            balance in -100i64..1000,
            counted in 0i64..1000,
        ) {
            let balance = Decimal::from(balance);
            let counted = Decimal::from(counted);
            let after = match count_adjustment(balance, counted) {
                Some(delta) => balance + delta.signed(),
                None => balance,
            };
            prop_assert_eq!(after, counted);
        }
    }
}

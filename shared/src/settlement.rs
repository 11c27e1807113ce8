//! Invoice settlement
//!
//! An invoice's `amount_paid` only grows through payments and never passes
//! its total. The invoice status follows from the two amounts.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::InvoiceStatus;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PaymentError {
    #[error("payment amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("payment of {amount} exceeds the outstanding balance of {outstanding}")]
    Overpayment { outstanding: Decimal, amount: Decimal },
}

/// Amount still owed on an invoice
pub fn outstanding_balance(total: Decimal, amount_paid: Decimal) -> Decimal {
    (total - amount_paid).max(Decimal::ZERO)
}

/// Status implied by the paid amount
pub fn settlement_status(total: Decimal, amount_paid: Decimal) -> InvoiceStatus {
    if amount_paid <= Decimal::ZERO && total > Decimal::ZERO {
        InvoiceStatus::Unpaid
    } else if amount_paid < total {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Paid
    }
}

/// New paid amount and status after applying a payment
pub fn apply_payment(
    total: Decimal,
    amount_paid: Decimal,
    amount: Decimal,
) -> Result<(Decimal, InvoiceStatus), PaymentError> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::NonPositiveAmount(amount));
    }
    let outstanding = outstanding_balance(total, amount_paid);
    if amount > outstanding {
        return Err(PaymentError::Overpayment { outstanding, amount });
    }

    let paid = amount_paid + amount;
    Ok((paid, settlement_status(total, paid)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_partial_then_full_payment() {
        let (paid, status) = apply_payment(dec("1500"), Decimal::ZERO, dec("600")).unwrap();
        assert_eq!(paid, dec("600"));
        assert_eq!(status, InvoiceStatus::PartiallyPaid);

        let (paid, status) = apply_payment(dec("1500"), paid, dec("900")).unwrap();
        assert_eq!(paid, dec("1500"));
        assert_eq!(status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let err = apply_payment(dec("100"), dec("80"), dec("20.01")).unwrap_err();
        assert_eq!(
            err,
            PaymentError::Overpayment {
                outstanding: dec("20"),
                amount: dec("20.01"),
            }
        );
    }

    #[test]
    fn test_zero_payment_rejected() {
        assert!(apply_payment(dec("100"), Decimal::ZERO, Decimal::ZERO).is_err());
        assert!(apply_payment(dec("100"), Decimal::ZERO, dec("-5")).is_err());
    }

    #[test]
    fn test_status_from_amounts() {
        assert_eq!(settlement_status(dec("50"), Decimal::ZERO), InvoiceStatus::Unpaid);
        assert_eq!(settlement_status(dec("50"), dec("49.99")), InvoiceStatus::PartiallyPaid);
        assert_eq!(settlement_status(dec("50"), dec("50")), InvoiceStatus::Paid);
        // fully discounted invoices are settled on creation
        assert_eq!(settlement_status(Decimal::ZERO, Decimal::ZERO), InvoiceStatus::Paid);
    }

    proptest! {
        #[test]
        fn prop_payments_never_exceed_total(
            total_cents in 1i64..10_000_000,
            payments in prop::collection::vec(1i64..5_000_000, 1..20),
        ) {
            let total = Decimal::new(total_cents, 2);
            let mut paid = Decimal::ZERO;
            for cents in payments {
                if let Ok((next, _)) = apply_payment(total, paid, Decimal::new(cents, 2)) {
                    paid = next;
                }
                prop_assert!(paid <= total);
                prop_assert_eq!(outstanding_balance(total, paid), total - paid);
            }
        }
    }
}

//! Trolley weigh-in verification gate

use rust_decimal::Decimal;

use crate::models::{VerificationOutcome, WeighIn};

/// Expected weight for a unit count, given the item's weight per unit
pub fn expected_weight(units: i32, unit_weight: Decimal) -> Decimal {
    Decimal::from(units) * unit_weight
}

/// Largest absolute weight deviation the tolerance allows
pub fn allowed_weight_variance(expected_weight: Decimal, tolerance_percent: Decimal) -> Decimal {
    (expected_weight * tolerance_percent / Decimal::ONE_HUNDRED).abs()
}

/// Evaluate a weigh-in against its expectations
///
/// Passes only when the unit count matches exactly and the absolute weight
/// variance is within the tolerance percentage of the expected weight.
pub fn evaluate_weigh_in(reading: &WeighIn) -> VerificationOutcome {
    let unit_variance = reading.actual_units - reading.expected_units;
    let weight_variance = reading.actual_weight - reading.expected_weight;
    let allowed = allowed_weight_variance(reading.expected_weight, reading.tolerance_percent);

    let weight_variance_percent = if reading.expected_weight.is_zero() {
        None
    } else {
        Some((weight_variance / reading.expected_weight * Decimal::ONE_HUNDRED).round_dp(2))
    };

    let mut reasons = Vec::new();
    if unit_variance != 0 {
        reasons.push(format!(
            "Unit count mismatch: expected {}, counted {}",
            reading.expected_units, reading.actual_units
        ));
    }
    if weight_variance.abs() > allowed {
        reasons.push(format!(
            "Weight variance {} exceeds tolerance of {} ({}%)",
            weight_variance.round_dp(3),
            allowed.round_dp(3),
            reading.tolerance_percent.normalize()
        ));
    }

    VerificationOutcome {
        passed: reasons.is_empty(),
        unit_variance,
        weight_variance,
        weight_variance_percent,
        allowed_weight_variance: allowed,
        rejection_reason: if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        },
    }
}

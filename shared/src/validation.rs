//! Validation utilities for the Stock Ledger Platform

use rust_decimal::Decimal;

/// Validate an item/location/supplier code (2-30 chars, uppercase alphanumeric, `-` or `_`)
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 2 {
        return Err("Code must be at least 2 characters");
    }
    if code.len() > 30 {
        return Err("Code must be at most 30 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err("Code must be uppercase alphanumeric, '-' or '_'");
    }
    Ok(())
}

/// Validate a quantity that moves stock
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a cost or price
pub fn validate_non_negative_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    Ok(())
}

/// Validate a percentage in the 0-100 range
pub fn validate_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a packs-per-bundle count
pub fn validate_packs_per_bundle(packs: i32) -> Result<(), &'static str> {
    if packs < 1 {
        return Err("Packs per bundle must be at least 1");
    }
    Ok(())
}

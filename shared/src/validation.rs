//! Validation utilities for the Pharmacy Management Platform
//!
//! Each check returns a static message suitable for a validation error.

use chrono::NaiveDate;
use rust_decimal::Decimal;

// ============================================================================
// Sale Validations
// ============================================================================

/// A sale must carry at least one line
pub fn validate_sale_has_lines(line_count: usize) -> Result<(), &'static str> {
    if line_count == 0 {
        return Err("Sale must include at least one sale item");
    }
    Ok(())
}

/// Line and batch quantities are whole units greater than zero
pub fn validate_quantity(quantity: i64) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be greater than 0");
    }
    Ok(())
}

/// Sale line prices must be strictly positive
pub fn validate_unit_price(unit_price: Decimal) -> Result<(), &'static str> {
    if unit_price <= Decimal::ZERO {
        return Err("Unit price must be greater than 0");
    }
    Ok(())
}

/// Payment method is free text but may not be blank
pub fn validate_payment_method(method: &str) -> Result<(), &'static str> {
    if method.trim().is_empty() {
        return Err("Payment method is required");
    }
    Ok(())
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Catalog prices may be zero (free samples) but never negative
pub fn validate_product_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Product price cannot be negative");
    }
    Ok(())
}

/// Names are required and trimmed before storage
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Name is required");
    }
    if name.len() > 255 {
        return Err("Name must be at most 255 characters");
    }
    Ok(())
}

/// Lot numbers used for lookups must carry some text
pub fn validate_batch_number(batch_number: &str) -> Result<(), &'static str> {
    if batch_number.trim().is_empty() {
        return Err("Batch number is required");
    }
    Ok(())
}

// ============================================================================
// Query Validations
// ============================================================================

/// Price bounds are non-negative and ordered
pub fn validate_price_range(min: Decimal, max: Decimal) -> Result<(), &'static str> {
    if min < Decimal::ZERO {
        return Err("Minimum price cannot be negative");
    }
    if min > max {
        return Err("Minimum price must not exceed maximum price");
    }
    Ok(())
}

/// Start date may not come after end date
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), &'static str> {
    if start > end {
        return Err("Start date must not be after end date");
    }
    Ok(())
}

/// Low-stock thresholds are non-negative
pub fn validate_threshold(threshold: i64) -> Result<(), &'static str> {
    if threshold < 0 {
        return Err("Threshold cannot be negative");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sale_requires_lines() {
        assert!(validate_sale_has_lines(0).is_err());
        assert!(validate_sale_has_lines(1).is_ok());
    }

    #[test]
    fn test_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-5).is_err());
    }

    #[test]
    fn test_unit_price() {
        assert!(validate_unit_price(Decimal::from_str("0.01").unwrap()).is_ok());
        assert!(validate_unit_price(Decimal::ZERO).is_err());
        assert!(validate_unit_price(Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_product_price_allows_zero() {
        assert!(validate_product_price(Decimal::ZERO).is_ok());
        assert!(validate_product_price(Decimal::from_str("-0.01").unwrap()).is_err());
    }

    #[test]
    fn test_payment_method() {
        assert!(validate_payment_method("cash").is_ok());
        assert!(validate_payment_method("   ").is_err());
    }

    #[test]
    fn test_name() {
        assert!(validate_name("Paracetamol").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_date_range() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(validate_date_range(jan, feb).is_ok());
        assert!(validate_date_range(jan, jan).is_ok());
        assert!(validate_date_range(feb, jan).is_err());
    }

    #[test]
    fn test_batch_number() {
        assert!(validate_batch_number("LOT-2024-01").is_ok());
        assert!(validate_batch_number(" ").is_err());
    }

    #[test]
    fn test_price_range() {
        let low = Decimal::from_str("1.50").unwrap();
        let high = Decimal::from(10);
        assert!(validate_price_range(low, high).is_ok());
        assert!(validate_price_range(low, low).is_ok());
        assert!(validate_price_range(high, low).is_err());
        assert!(validate_price_range(Decimal::from(-1), high).is_err());
    }

    #[test]
    fn test_threshold() {
        assert!(validate_threshold(0).is_ok());
        assert!(validate_threshold(-1).is_err());
    }
}

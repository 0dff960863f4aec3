// Validation utilities module
// Custom validation functions for administrator input on promotions and orders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use validator::ValidationError;

/// Validates that a discount rate is a price multiplier strictly between 0 and 1
pub fn validate_discount_rate(rate: &Decimal) -> Result<(), ValidationError> {
    if *rate > Decimal::ZERO && *rate < Decimal::ONE {
        Ok(())
    } else {
        Err(ValidationError::new("discount_rate_out_of_range"))
    }
}

/// Validates that a currency amount is strictly positive
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("amount_must_be_positive"))
    }
}

/// Validates that a text field holds more than whitespace
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// Validates that a validity window ends after it starts
pub fn validate_window(
    valid_from: &DateTime<Utc>,
    valid_until: &DateTime<Utc>,
) -> Result<(), ValidationError> {
    if valid_until > valid_from {
        Ok(())
    } else {
        Err(ValidationError::new("window_end_before_start"))
    }
}

/// Validates that a reduction is smaller than the spend threshold that unlocks it
pub fn validate_reduction_terms(
    threshold_amount: &Decimal,
    reduction_amount: &Decimal,
) -> Result<(), ValidationError> {
    if reduction_amount < threshold_amount {
        Ok(())
    } else {
        Err(ValidationError::new("reduction_not_below_threshold"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_rate_bounds_are_exclusive() {
        assert!(validate_discount_rate(&dec!(0.8)).is_ok());
        assert!(validate_discount_rate(&dec!(0.01)).is_ok());
        assert!(validate_discount_rate(&dec!(0)).is_err());
        assert!(validate_discount_rate(&dec!(1)).is_err());
        assert!(validate_discount_rate(&dec!(1.2)).is_err());
        assert!(validate_discount_rate(&dec!(-0.5)).is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount(&dec!(0.01)).is_ok());
        assert!(validate_positive_amount(&dec!(0)).is_err());
        assert!(validate_positive_amount(&dec!(-3)).is_err());
    }

    #[test]
    fn test_not_blank() {
        assert!(validate_not_blank("Spring sale").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }

    #[test]
    fn test_window_must_end_after_start() {
        let start = Utc::now();
        assert!(validate_window(&start, &(start + Duration::days(1))).is_ok());
        assert!(validate_window(&start, &start).is_err());
        assert!(validate_window(&start, &(start - Duration::seconds(1))).is_err());
    }

    #[test]
    fn test_reduction_must_stay_below_threshold() {
        assert!(validate_reduction_terms(&dec!(300), &dec!(50)).is_ok());
        assert!(validate_reduction_terms(&dec!(300), &dec!(300)).is_err());
        assert!(validate_reduction_terms(&dec!(100), &dec!(150)).is_err());
    }
}

//! Fixed-point amount helpers.
//!
//! Every amount in the system is a [`Decimal`] with at most
//! [`AMOUNT_SCALE`](crate::constants::AMOUNT_SCALE) fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::{constants, Result, TripfinError};

/// Round half-up (away from zero) to the ledger precision.
#[must_use]
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(constants::AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Reject non-positive amounts and amounts finer than the ledger precision.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(TripfinError::validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount.normalize().scale() > constants::AMOUNT_SCALE {
        return Err(TripfinError::validation(format!(
            "amount {amount} exceeds {} decimal places",
            constants::AMOUNT_SCALE
        )));
    }
    Ok(())
}

/// Reject percentages outside `[0, 100]`.
pub fn validate_percent(name: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > Decimal::from(constants::MAX_PERCENT) {
        return Err(TripfinError::validation(format!(
            "{name} must be within 0..=100, got {value}"
        )));
    }
    Ok(())
}

/// `base × percent / 100`, rounded to ledger precision.
#[must_use]
pub fn percent_of(base: Decimal, percent: Decimal) -> Decimal {
    round_amount(base * percent / Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_amount(Decimal::new(123_455, 5)), Decimal::new(12_346, 4));
        assert_eq!(round_amount(Decimal::new(123_454, 5)), Decimal::new(12_345, 4));
    }

    #[test]
    fn rejects_zero_negative_and_sub_precision() {
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-1, 0)).is_err());
        assert!(validate_amount(Decimal::new(1, 5)).is_err());
        assert!(validate_amount(Decimal::new(1, 4)).is_ok());
        // Trailing zeros don't count against precision.
        assert!(validate_amount(Decimal::new(1_000_000, 6)).is_ok());
    }

    #[test]
    fn percent_bounds() {
        assert!(validate_percent("fee", Decimal::new(2, 0)).is_ok());
        assert!(validate_percent("fee", Decimal::new(101, 0)).is_err());
        assert!(validate_percent("fee", Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn two_percent_fee() {
        assert_eq!(
            percent_of(Decimal::new(100_000, 0), Decimal::new(2, 0)),
            Decimal::new(2000, 0)
        );
    }
}

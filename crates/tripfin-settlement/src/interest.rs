//! Interest and fee arithmetic.
//!
//! Simple interest on a 365-day year, rounded half-up to ledger precision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tripfin_types::{constants, money, Result, TripfinError};

/// Whole days between financing and repayment, never less than one.
pub fn days_used(financing: DateTime<Utc>, repayment: DateTime<Utc>) -> Result<i64> {
    if repayment < financing {
        return Err(TripfinError::validation(format!(
            "repayment date {repayment} precedes financing date {financing}"
        )));
    }
    Ok((repayment - financing).num_days().max(constants::MIN_DAYS_USED))
}

/// `principal × rate/100 × days/365`, rounded half-up to 4 places.
#[must_use]
pub fn calculate_interest(principal: Decimal, annual_rate_percent: Decimal, days: i64) -> Decimal {
    money::round_amount(
        principal * annual_rate_percent / Decimal::ONE_HUNDRED * Decimal::from(days)
            / Decimal::from(constants::DAYS_PER_YEAR),
    )
}

/// Platform fee on `principal`. An unset percentage means no fee.
pub fn platform_fee(principal: Decimal, percent: Option<Decimal>) -> Result<Decimal> {
    let Some(percent) = percent else {
        return Ok(Decimal::ZERO);
    };
    money::validate_percent("platform fee percent", percent)?;
    Ok(money::percent_of(principal, percent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn interest_reference_value() {
        // 100000 × 0.125 × 30/365 = 1027.39726...
        let interest = calculate_interest(Decimal::new(100_000, 0), Decimal::new(125, 1), 30);
        assert_eq!(interest, Decimal::new(10_273_973, 4));
    }

    #[test]
    fn interest_rounds_half_up() {
        // 0.0005 × 10% over a full year lands exactly on 0.00005.
        assert_eq!(
            calculate_interest(Decimal::new(73, 0), Decimal::new(10, 0), 1),
            Decimal::new(200, 4)
        );
        assert_eq!(
            calculate_interest(Decimal::new(5, 4), Decimal::new(10, 0), 365),
            Decimal::new(1, 4)
        );
    }

    #[test]
    fn days_floor_at_one() {
        let t0 = Utc::now();
        assert_eq!(days_used(t0, t0).unwrap(), 1);
        assert_eq!(days_used(t0, t0 + Duration::hours(23)).unwrap(), 1);
        assert_eq!(days_used(t0, t0 + Duration::hours(49)).unwrap(), 2);
        assert_eq!(days_used(t0, t0 + Duration::days(30)).unwrap(), 30);
    }

    #[test]
    fn repayment_before_financing_rejected() {
        let t0 = Utc::now();
        let err = days_used(t0, t0 - Duration::days(1)).unwrap_err();
        assert!(matches!(err, TripfinError::Validation { .. }));
    }

    #[test]
    fn fee_defaults_to_zero() {
        let principal = Decimal::new(100_000, 0);
        assert_eq!(platform_fee(principal, None).unwrap(), Decimal::ZERO);
        assert_eq!(
            platform_fee(principal, Some(Decimal::new(2, 0))).unwrap(),
            Decimal::new(2_000, 0)
        );
        assert!(platform_fee(principal, Some(Decimal::new(101, 0))).is_err());
    }
}

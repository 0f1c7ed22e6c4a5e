//! Supply conservation for the wallet ledger.
//!
//! Only deposits and withdrawals move money across the platform boundary,
//! so for every currency:
//! ```text
//! Σ wallet balances == Σ deposits − Σ withdrawals
//! ```
//! Financing, repayment and manual transfers must leave the total untouched.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tripfin_types::{Result, TripfinError};

/// External inflow and outflow of one currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flow {
    deposited: Decimal,
    withdrawn: Decimal,
}

/// Per-currency record of money that entered or left the platform.
#[derive(Debug, Default)]
pub struct SupplyTracker {
    flows: HashMap<String, Flow>,
}

impl SupplyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_deposit(&mut self, currency: &str, amount: Decimal) {
        self.flows.entry(currency.to_string()).or_default().deposited += amount;
    }

    pub fn record_withdrawal(&mut self, currency: &str, amount: Decimal) {
        self.flows.entry(currency.to_string()).or_default().withdrawn += amount;
    }

    /// Σ deposits − Σ withdrawals for `currency`.
    #[must_use]
    pub fn expected_supply(&self, currency: &str) -> Decimal {
        self.flows
            .get(currency)
            .map_or(Decimal::ZERO, |f| f.deposited - f.withdrawn)
    }

    /// # Errors
    /// Returns [`TripfinError::SupplyInvariantViolation`] if `actual` differs
    /// from the expected supply.
    pub fn verify(&self, currency: &str, actual: Decimal) -> Result<()> {
        let expected = self.expected_supply(currency);
        if actual == expected {
            return Ok(());
        }
        let flow = self.flows.get(currency).copied().unwrap_or_default();
        Err(TripfinError::SupplyInvariantViolation {
            reason: format!(
                "{currency}: wallets hold {actual}, expected {expected} \
                 (deposited={}, withdrawn={})",
                flow.deposited, flow.withdrawn
            ),
        })
    }

    /// Currencies that have seen any external flow.
    #[must_use]
    pub fn currencies(&self) -> Vec<String> {
        let mut out: Vec<String> = self.flows.keys().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_currency_expects_zero() {
        let tracker = SupplyTracker::new();
        assert_eq!(tracker.expected_supply("INR"), Decimal::ZERO);
        assert!(tracker.verify("INR", Decimal::ZERO).is_ok());
    }

    #[test]
    fn deposits_minus_withdrawals() {
        let mut tracker = SupplyTracker::new();
        tracker.record_deposit("INR", Decimal::new(500_000, 0));
        tracker.record_withdrawal("INR", Decimal::new(20_000, 0));
        assert_eq!(tracker.expected_supply("INR"), Decimal::new(480_000, 0));
        assert!(tracker.verify("INR", Decimal::new(480_000, 0)).is_ok());
    }

    #[test]
    fn mismatch_is_reported() {
        let mut tracker = SupplyTracker::new();
        tracker.record_deposit("INR", Decimal::new(10, 0));
        let err = tracker.verify("INR", Decimal::new(11, 0)).unwrap_err();
        assert!(matches!(err, TripfinError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn currencies_are_independent() {
        let mut tracker = SupplyTracker::new();
        tracker.record_deposit("INR", Decimal::new(5, 0));
        tracker.record_deposit("USD", Decimal::new(7, 0));
        assert_eq!(tracker.currencies(), vec!["INR".to_string(), "USD".to_string()]);
        assert_eq!(tracker.expected_supply("USD"), Decimal::new(7, 0));
    }
}

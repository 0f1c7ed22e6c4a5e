//! Lender bids on trips.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐ counter ┌───────────┐
//!   │ PENDING ├────────▶│ COUNTERED │
//!   └────┬────┘         └─────┬─────┘
//!        │                    │
//!        └──────┬─────────────┘
//!               │ accept / reject / cancel / expire
//!               ▼
//!   ACCEPTED · REJECTED · CANCELLED · EXPIRED   (terminal)
//! ```
//!
//! Transitions are monotonic: nothing ever leaves a terminal state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{money, AuditFields, BidId, CompanyId, Result, TripId, TripfinError, UserId};

/// Lifecycle status of a bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BidStatus {
    Pending,
    Countered,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

impl BidStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(
                target,
                Self::Countered | Self::Accepted | Self::Rejected | Self::Cancelled | Self::Expired
            ),
            Self::Countered => matches!(
                target,
                Self::Accepted | Self::Rejected | Self::Cancelled | Self::Expired
            ),
            Self::Accepted | Self::Rejected | Self::Cancelled | Self::Expired => false,
        }
    }

    /// PENDING or COUNTERED.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Countered)
    }
}

impl std::fmt::Display for BidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Countered => write!(f, "COUNTERED"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Amount, rate and tenor of a financing offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidTerms {
    pub amount: Decimal,
    /// Annual simple interest rate in percent (12.5 = 12.5%).
    pub interest_rate: Decimal,
    pub maturity_days: u32,
}

impl BidTerms {
    pub fn validate(&self) -> Result<()> {
        money::validate_amount(self.amount)?;
        money::validate_percent("interest rate", self.interest_rate)?;
        if self.maturity_days == 0 {
            return Err(TripfinError::validation("maturity days must be positive"));
        }
        Ok(())
    }
}

/// The transporter's counter-proposal on a bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOffer {
    pub terms: BidTerms,
    pub note: Option<String>,
    pub countered_at: DateTime<Utc>,
}

/// A lender's offer against a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripBid {
    pub id: BidId,
    pub trip_id: TripId,
    pub lender_id: UserId,
    pub company_id: CompanyId,
    /// The terms as the lender placed them.
    pub terms: BidTerms,
    pub status: BidStatus,
    pub counter: Option<CounterOffer>,
    pub expires_at: DateTime<Utc>,
    /// Rejection / cancellation reason, when one was given.
    pub closed_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub audit: AuditFields,
}

impl TripBid {
    /// Terms currently on the table: the counter-offer once countered,
    /// otherwise the original bid.
    #[must_use]
    pub fn standing_terms(&self) -> BidTerms {
        match (&self.counter, self.status) {
            (Some(counter), BidStatus::Countered | BidStatus::Accepted) => counter.terms,
            _ => self.terms,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Active but past `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now >= self.expires_at
    }

    /// Apply a status change through the transition table.
    ///
    /// # Errors
    /// Returns [`TripfinError::InvalidTransition`] if the table forbids it.
    pub fn transition(&mut self, target: BidStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(TripfinError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        if !target.is_active() {
            self.closed_at = Some(now);
        }
        self.audit.touch(now);
        Ok(())
    }
}

/// Dummy bid for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl TripBid {
    pub fn dummy(trip_id: TripId, lender_id: UserId, amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: BidId::new(),
            trip_id,
            lender_id,
            company_id: CompanyId::new(),
            terms: BidTerms {
                amount,
                interest_rate: Decimal::new(125, 1),
                maturity_days: 30,
            },
            status: BidStatus::Pending,
            counter: None,
            expires_at: now + chrono::Duration::hours(1),
            closed_reason: None,
            closed_at: None,
            audit: AuditFields::new(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BidStatus; 6] = [
        BidStatus::Pending,
        BidStatus::Countered,
        BidStatus::Accepted,
        BidStatus::Rejected,
        BidStatus::Cancelled,
        BidStatus::Expired,
    ];

    #[test]
    fn active_states_can_close() {
        for from in [BidStatus::Pending, BidStatus::Countered] {
            for to in [
                BidStatus::Accepted,
                BidStatus::Rejected,
                BidStatus::Cancelled,
                BidStatus::Expired,
            ] {
                assert!(from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn only_pending_can_be_countered() {
        assert!(BidStatus::Pending.can_transition_to(BidStatus::Countered));
        assert!(!BidStatus::Countered.can_transition_to(BidStatus::Countered));
    }

    #[test]
    fn terminal_states_never_move() {
        for from in ALL.iter().copied().filter(|s| !s.is_active()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must fail");
            }
        }
    }

    #[test]
    fn standing_terms_follow_counter() {
        let mut bid = TripBid::dummy(TripId::new(), UserId::new(), Decimal::new(100_000, 0));
        assert_eq!(bid.standing_terms(), bid.terms);

        let countered = BidTerms {
            amount: Decimal::new(90_000, 0),
            interest_rate: Decimal::new(11, 0),
            maturity_days: 45,
        };
        bid.counter = Some(CounterOffer {
            terms: countered,
            note: None,
            countered_at: Utc::now(),
        });
        bid.transition(BidStatus::Countered, Utc::now()).unwrap();
        assert_eq!(bid.standing_terms(), countered);
    }

    #[test]
    fn transition_stamps_closed_at() {
        let mut bid = TripBid::dummy(TripId::new(), UserId::new(), Decimal::new(10, 0));
        let now = Utc::now();
        bid.transition(BidStatus::Rejected, now).unwrap();
        assert_eq!(bid.closed_at, Some(now));
        let err = bid.transition(BidStatus::Accepted, now).unwrap_err();
        assert!(matches!(err, TripfinError::InvalidTransition { .. }));
    }

    #[test]
    fn expiry_only_applies_to_active_bids() {
        let mut bid = TripBid::dummy(TripId::new(), UserId::new(), Decimal::new(10, 0));
        let later = bid.expires_at + chrono::Duration::seconds(1);
        assert!(bid.is_expired(later));
        bid.transition(BidStatus::Cancelled, Utc::now()).unwrap();
        assert!(!bid.is_expired(later));
    }

    #[test]
    fn terms_validation() {
        let mut terms = BidTerms {
            amount: Decimal::new(100, 0),
            interest_rate: Decimal::new(12, 0),
            maturity_days: 30,
        };
        assert!(terms.validate().is_ok());
        terms.maturity_days = 0;
        assert!(terms.validate().is_err());
        terms.maturity_days = 30;
        terms.amount = Decimal::ZERO;
        assert!(terms.validate().is_err());
    }
}

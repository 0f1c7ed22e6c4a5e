//! Bid engine.
//!
//! Lenders place bids on trips; the transporter counters, accepts or
//! rejects; the lender accepts a counter or cancels. Every mutation runs
//! inside the trip's lock, so the two exclusivity rules hold under
//! concurrency:
//! - a lender holds at most one PENDING/COUNTERED bid per trip
//! - at most one bid per trip ever reaches ACCEPTED

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tripfin_types::{
    AuditFields, BidId, BidStatus, BidTerms, Clock, CompanyId, CounterOffer, EngineConfig, Result,
    TripBid, TripDirectory, TripId, TripInfo, TripfinError, UserId,
};

use crate::trip_table::TripTable;

/// Command to place a new bid.
#[derive(Debug, Clone)]
pub struct PlaceBid {
    pub trip_id: TripId,
    pub lender_id: UserId,
    pub company_id: CompanyId,
    pub terms: BidTerms,
    /// Defaults to now + `bid_validity_hours`.
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct BidEngine {
    table: TripTable<BidId, TripBid>,
    trips: Arc<dyn TripDirectory>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl BidEngine {
    #[must_use]
    pub fn new(config: &EngineConfig, trips: Arc<dyn TripDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: TripTable::new(config.lock_timeout()),
            trips,
            clock,
            config: config.clone(),
        }
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    /// Place a PENDING bid.
    ///
    /// # Errors
    /// - `Validation` for bad terms or an expiry in the past
    /// - `TripNotFound`, `NotPermitted` (transporter bidding on own trip)
    /// - `DuplicateBid` if the lender already has an active bid on the trip
    /// - `AlreadyAccepted` if the trip already has a winning bid
    pub fn place_bid(&self, cmd: PlaceBid) -> Result<TripBid> {
        cmd.terms.validate()?;
        let trip = self.trip(cmd.trip_id)?;
        if trip.transporter_id == cmd.lender_id {
            return Err(TripfinError::not_permitted(
                "transporter cannot bid on own trip",
            ));
        }
        let now = self.clock.now();
        let expires_at = cmd
            .expires_at
            .unwrap_or_else(|| now + self.config.bid_validity());
        if expires_at <= now {
            return Err(TripfinError::validation("bid expiry must be in the future"));
        }

        self.table.with_trip(cmd.trip_id, |bids| {
            if bids.iter().any(|b| b.status == BidStatus::Accepted) {
                return Err(TripfinError::AlreadyAccepted(cmd.trip_id));
            }
            // A stale active bid no longer blocks the lender.
            for bid in bids.iter_mut().filter(|b| b.is_expired(now)) {
                bid.transition(BidStatus::Expired, now)?;
            }
            if bids
                .iter()
                .any(|b| b.lender_id == cmd.lender_id && b.is_active())
            {
                return Err(TripfinError::DuplicateBid {
                    trip: cmd.trip_id,
                    lender: cmd.lender_id,
                });
            }

            let bid = TripBid {
                id: BidId::new(),
                trip_id: cmd.trip_id,
                lender_id: cmd.lender_id,
                company_id: cmd.company_id,
                terms: cmd.terms,
                status: BidStatus::Pending,
                counter: None,
                expires_at,
                closed_reason: None,
                closed_at: None,
                audit: AuditFields::new(now),
            };
            bids.push(bid.clone());
            self.table.register(bid.id, bid.trip_id);

            tracing::info!(
                bid = %bid.id,
                trip = %bid.trip_id,
                lender = %bid.lender_id,
                amount = %bid.terms.amount,
                rate = %bid.terms.interest_rate,
                "Bid placed"
            );
            Ok(bid)
        })
    }

    /// PENDING → COUNTERED. Transporter only.
    pub fn counter_bid(
        &self,
        bid_id: BidId,
        transporter_id: UserId,
        terms: BidTerms,
        note: Option<String>,
    ) -> Result<TripBid> {
        terms.validate()?;
        self.mutate(bid_id, |bid, _, trip, now| {
            Self::require_transporter(trip, transporter_id)?;
            Self::require_open(bid, now)?;
            if bid.status != BidStatus::Pending {
                return Err(TripfinError::InvalidTransition {
                    from: bid.status.to_string(),
                    to: BidStatus::Countered.to_string(),
                });
            }
            bid.counter = Some(CounterOffer {
                terms,
                note,
                countered_at: now,
            });
            bid.transition(BidStatus::Countered, now)?;
            tracing::info!(bid = %bid.id, amount = %terms.amount, rate = %terms.interest_rate, "Bid countered");
            Ok(())
        })
    }

    /// PENDING / COUNTERED → ACCEPTED.
    ///
    /// The party that did *not* author the standing terms accepts: the
    /// transporter accepts a PENDING bid, the lender accepts a counter.
    ///
    /// # Errors
    /// - `BidExpired` if the bid is past expiry (it is moved to EXPIRED) or closed
    /// - `AlreadyAccepted` if this or another bid on the trip already won
    /// - `NotPermitted` if `actor` is not the accepting party
    pub fn accept_bid(&self, bid_id: BidId, actor: UserId) -> Result<TripBid> {
        self.mutate(bid_id, |bid, rivals_accepted, trip, now| {
            let acceptor = match bid.status {
                BidStatus::Countered => bid.lender_id,
                _ => trip.transporter_id,
            };
            if actor != acceptor && actor != trip.transporter_id && actor != bid.lender_id {
                return Err(TripfinError::not_permitted("actor is not a party to this bid"));
            }
            if bid.status == BidStatus::Accepted {
                return Err(TripfinError::AlreadyAccepted(bid.trip_id));
            }
            Self::require_open(bid, now)?;
            if actor != acceptor {
                return Err(TripfinError::not_permitted(format!(
                    "{} terms must be accepted by the counterparty",
                    bid.status
                )));
            }
            if rivals_accepted {
                tracing::warn!(bid = %bid.id, trip = %bid.trip_id, "Acceptance lost: trip already has an accepted bid");
                return Err(TripfinError::AlreadyAccepted(bid.trip_id));
            }
            bid.transition(BidStatus::Accepted, now)?;
            let terms = bid.standing_terms();
            tracing::info!(
                bid = %bid.id,
                trip = %bid.trip_id,
                lender = %bid.lender_id,
                amount = %terms.amount,
                "Bid accepted"
            );
            Ok(())
        })
    }

    /// PENDING / COUNTERED → REJECTED. Transporter only.
    pub fn reject_bid(
        &self,
        bid_id: BidId,
        transporter_id: UserId,
        reason: Option<String>,
    ) -> Result<TripBid> {
        self.mutate(bid_id, |bid, _, trip, now| {
            Self::require_transporter(trip, transporter_id)?;
            Self::require_open(bid, now)?;
            bid.closed_reason = reason;
            bid.transition(BidStatus::Rejected, now)?;
            tracing::info!(bid = %bid.id, "Bid rejected");
            Ok(())
        })
    }

    /// PENDING / COUNTERED → CANCELLED. The bidding lender only.
    pub fn cancel_bid(&self, bid_id: BidId, lender_id: UserId, reason: Option<String>) -> Result<TripBid> {
        self.mutate(bid_id, |bid, _, _, now| {
            if bid.lender_id != lender_id {
                return Err(TripfinError::not_permitted("only the bidding lender may cancel"));
            }
            Self::require_open(bid, now)?;
            bid.closed_reason = reason;
            bid.transition(BidStatus::Cancelled, now)?;
            tracing::info!(bid = %bid.id, "Bid cancelled");
            Ok(())
        })
    }

    /// Move every active bid whose expiry has passed to EXPIRED.
    pub fn sweep_expired(&self) -> Result<Vec<BidId>> {
        self.sweep_expired_at(self.clock.now())
    }

    /// Sweep against an explicit instant. Monotonic and idempotent: it only
    /// ever moves bids out of the active set, so repeated or concurrent
    /// runs are harmless. A trip whose lock can't be taken in time is
    /// skipped and logged; the rest are still swept.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<Vec<BidId>> {
        let mut expired = Vec::new();
        for trip_id in self.table.trip_ids() {
            let swept = self.table.with_trip(trip_id, |bids| {
                for bid in bids.iter_mut().filter(|b| b.is_expired(now)) {
                    bid.transition(BidStatus::Expired, now)?;
                    expired.push(bid.id);
                }
                Ok(())
            });
            if let Err(err) = swept {
                // Busy trips are picked up by the next run.
                tracing::warn!(trip = %trip_id, error = %err, "Skipping trip during expiry sweep");
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired stale bids");
        }
        Ok(expired)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    pub fn get_bid(&self, bid_id: BidId) -> Result<TripBid> {
        let trip_id = self.table.trip_of(bid_id).ok_or(TripfinError::BidNotFound(bid_id))?;
        self.table.with_trip(trip_id, |bids| {
            bids.iter()
                .find(|b| b.id == bid_id)
                .cloned()
                .ok_or(TripfinError::BidNotFound(bid_id))
        })
    }

    pub fn list_bids_for_trip(&self, trip_id: TripId) -> Result<Vec<TripBid>> {
        self.table.with_trip(trip_id, |bids| Ok(bids.clone()))
    }

    /// PENDING / COUNTERED bids that have not yet passed expiry.
    pub fn list_active_bids(&self, trip_id: TripId) -> Result<Vec<TripBid>> {
        let now = self.clock.now();
        self.table.with_trip(trip_id, |bids| {
            Ok(bids
                .iter()
                .filter(|b| b.is_active() && !b.is_expired(now))
                .cloned()
                .collect())
        })
    }

    pub fn accepted_bid(&self, trip_id: TripId) -> Result<Option<TripBid>> {
        self.table.with_trip(trip_id, |bids| {
            Ok(bids
                .iter()
                .find(|b| b.status == BidStatus::Accepted)
                .cloned())
        })
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Locate a bid, lock its trip, and run `f` with
    /// `(bid, another_bid_accepted, trip, now)`. Changes `f` makes stick even
    /// if it then fails (lazy expiry).
    fn mutate(
        &self,
        bid_id: BidId,
        f: impl FnOnce(&mut TripBid, bool, &TripInfo, DateTime<Utc>) -> Result<()>,
    ) -> Result<TripBid> {
        let trip_id = self.table.trip_of(bid_id).ok_or(TripfinError::BidNotFound(bid_id))?;
        let trip = self.trip(trip_id)?;
        let now = self.clock.now();
        self.table.with_trip(trip_id, |bids| {
            let rivals_accepted = bids
                .iter()
                .any(|b| b.id != bid_id && b.status == BidStatus::Accepted);
            let bid = bids
                .iter_mut()
                .find(|b| b.id == bid_id)
                .ok_or(TripfinError::BidNotFound(bid_id))?;
            f(bid, rivals_accepted, &trip, now)?;
            Ok(bid.clone())
        })
    }

    /// The bid must be active and inside its validity window. An active bid
    /// found past expiry is moved to EXPIRED on the spot.
    fn require_open(bid: &mut TripBid, now: DateTime<Utc>) -> Result<()> {
        if bid.is_expired(now) {
            bid.transition(BidStatus::Expired, now)?;
            tracing::info!(bid = %bid.id, "Bid expired on access");
            return Err(TripfinError::BidExpired(bid.id));
        }
        if !bid.is_active() {
            return Err(TripfinError::BidExpired(bid.id));
        }
        Ok(())
    }

    fn require_transporter(trip: &TripInfo, actor: UserId) -> Result<()> {
        if trip.transporter_id != actor {
            return Err(TripfinError::not_permitted(
                "only the trip's transporter may do this",
            ));
        }
        Ok(())
    }

    fn trip(&self, trip_id: TripId) -> Result<TripInfo> {
        self.trips
            .trip(trip_id)
            .ok_or(TripfinError::TripNotFound(trip_id))
    }
}

//! # tripfin-offers
//!
//! **Offer plane**: lender bids and interest-to-finance proposals, and the
//! arbitration that lets at most one offer per trip win.
//!
//! ## Architecture
//!
//! 1. **TripTable**: offers grouped per trip behind one lock per trip, so
//!    every check-and-set on a trip (placement guard, acceptance) is
//!    serialized while different trips proceed in parallel
//! 2. **BidEngine**: PENDING → COUNTERED → ACCEPTED | REJECTED | CANCELLED | EXPIRED
//! 3. **ProposalEngine**: PENDING → ACCEPTED (cascade-rejects rivals) | REJECTED | WITHDRAWN
//! 4. **sweeper**: periodic, idempotent bid expiry on a tokio task

pub mod bids;
pub mod proposals;
pub mod sweeper;
pub mod trip_table;

pub use bids::{BidEngine, PlaceBid};
pub use proposals::{AcceptedProposal, ProposalEngine};
pub use sweeper::spawn_expiry_sweeper;
pub use trip_table::TripTable;

//! # tripfin-settlement
//!
//! **Settlement plane**: turns an ACCEPTED bid or proposal into money
//! movement and a durable [`TripFinancial`](tripfin_types::TripFinancial)
//! record, and later settles the repayment.
//!
//! ## Flow
//!
//! 1. Resolve principal from the accepted offer (bid amount, or invoice ×
//!    contract loan percent for proposals)
//! 2. Deduct the platform fee; the transporter receives the net
//! 3. Reserve the trip in the [`FinancingGuard`] (exactly-once financing)
//! 4. Post a balanced FINANCING transaction through the coordinator
//! 5. Record the trip financial; repayment later moves principal + interest
//!    back, interest always on the pre-fee principal

pub mod engine;
pub mod guard;
pub mod interest;
pub mod telemetry;

pub use engine::{SettlementEngine, SettlementParts};
pub use guard::FinancingGuard;
pub use telemetry::{init_tracing, LogFormat};

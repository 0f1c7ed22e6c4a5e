//! Background bid expiry.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::bids::BidEngine;

/// Run [`BidEngine::sweep_expired`] every `period` until the handle is
/// aborted. Sweep errors (lock contention) are logged and the next tick
/// tries again.
pub fn spawn_expiry_sweeper(engine: Arc<BidEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match engine.sweep_expired() {
                Ok(expired) if !expired.is_empty() => {
                    tracing::debug!(count = expired.len(), "Expiry sweep tick");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "Expiry sweep failed, will retry"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal::Decimal;
    use tripfin_types::{
        BidStatus, BidTerms, Clock, CompanyId, EngineConfig, InMemoryTrips, ManualClock, TripId,
        TripInfo, UserId,
    };

    use crate::bids::PlaceBid;

    #[tokio::test]
    async fn sweeper_expires_stale_bids() {
        let trips = Arc::new(InMemoryTrips::new());
        let trip = TripId::new();
        trips.insert(TripInfo {
            trip_id: trip,
            transporter_id: UserId::new(),
            invoice_amount: Decimal::new(1_000, 0),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = Arc::new(BidEngine::new(
            &EngineConfig::default(),
            trips,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let bid = engine
            .place_bid(PlaceBid {
                trip_id: trip,
                lender_id: UserId::new(),
                company_id: CompanyId::new(),
                terms: BidTerms {
                    amount: Decimal::new(500, 0),
                    interest_rate: Decimal::new(10, 0),
                    maturity_days: 15,
                },
                expires_at: Some(clock.now() + ChronoDuration::minutes(5)),
            })
            .unwrap();

        clock.advance(ChronoDuration::minutes(6));
        let handle = spawn_expiry_sweeper(Arc::clone(&engine), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(engine.get_bid(bid.id).unwrap().status, BidStatus::Expired);
    }
}

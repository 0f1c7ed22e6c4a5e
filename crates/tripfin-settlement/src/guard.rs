//! Financing idempotency guard: each trip is financed at most once.
//!
//! A trip moves through `reserve` → `commit` (FINANCED for good) or
//! `reserve` → `release` (attempt failed, free to retry). A second caller
//! that arrives while an attempt is in flight gets a retryable
//! [`TripfinError::ConcurrencyConflict`]; one that arrives after commit gets
//! [`TripfinError::AlreadyFinanced`].

use std::collections::HashMap;

use parking_lot::Mutex;
use tripfin_types::{Result, TripId, TripfinError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    InFlight,
    Financed,
}

#[derive(Debug, Default)]
pub struct FinancingGuard {
    slots: Mutex<HashMap<TripId, Slot>>,
}

impl FinancingGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the trip for one financing attempt.
    ///
    /// # Errors
    /// [`TripfinError::AlreadyFinanced`] if committed,
    /// [`TripfinError::ConcurrencyConflict`] if another attempt holds it.
    pub fn reserve(&self, trip_id: TripId) -> Result<()> {
        let mut slots = self.slots.lock();
        match slots.get(&trip_id) {
            Some(Slot::Financed) => Err(TripfinError::AlreadyFinanced(trip_id)),
            Some(Slot::InFlight) => Err(TripfinError::conflict(format!("financing of {trip_id}"))),
            None => {
                slots.insert(trip_id, Slot::InFlight);
                Ok(())
            }
        }
    }

    pub fn commit(&self, trip_id: TripId) {
        self.slots.lock().insert(trip_id, Slot::Financed);
    }

    /// Drop an in-flight reservation. A committed trip stays committed.
    pub fn release(&self, trip_id: TripId) {
        let mut slots = self.slots.lock();
        if slots.get(&trip_id) == Some(&Slot::InFlight) {
            slots.remove(&trip_id);
        }
    }

    pub fn is_financed(&self, trip_id: TripId) -> bool {
        self.slots.lock().get(&trip_id) == Some(&Slot::Financed)
    }

    /// Trips committed as financed.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|s| **s == Slot::Financed)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Per-trip record groups with lock-timeout semantics.

use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use parking_lot::{Mutex, RwLock};
use tripfin_types::{Result, TripId, TripfinError};

/// Records of type `T`, keyed by `K`, grouped by trip.
///
/// All records of one trip live behind one mutex. A closure passed to
/// [`TripTable::with_trip`] sees the trip's records atomically, which is
/// what makes "verify no other offer is ACCEPTED, then accept" a single
/// check-and-set.
pub struct TripTable<K, T> {
    trips: RwLock<HashMap<TripId, Arc<Mutex<Vec<T>>>>>,
    index: RwLock<HashMap<K, TripId>>,
    lock_timeout: Duration,
}

impl<K, T> TripTable<K, T>
where
    K: Copy + Eq + Hash,
{
    #[must_use]
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            trips: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Run `f` with exclusive access to the trip's records. Creates the
    /// group on first use.
    ///
    /// # Errors
    /// [`TripfinError::ConcurrencyConflict`] if the trip lock isn't acquired
    /// within the timeout; otherwise whatever `f` returns.
    pub fn with_trip<R>(&self, trip_id: TripId, f: impl FnOnce(&mut Vec<T>) -> Result<R>) -> Result<R> {
        let group = self.group(trip_id);
        let mut records = group
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| TripfinError::conflict(trip_id))?;
        f(&mut records)
    }

    /// Which trip a record belongs to.
    pub fn trip_of(&self, key: K) -> Option<TripId> {
        self.index.read().get(&key).copied()
    }

    /// Index a newly inserted record. Call from inside `with_trip`.
    pub fn register(&self, key: K, trip_id: TripId) {
        self.index.write().insert(key, trip_id);
    }

    /// Every trip that has records.
    pub fn trip_ids(&self) -> Vec<TripId> {
        self.trips.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn group(&self, trip_id: TripId) -> Arc<Mutex<Vec<T>>> {
        if let Some(group) = self.trips.read().get(&trip_id) {
            return Arc::clone(group);
        }
        Arc::clone(self.trips.write().entry(trip_id).or_default())
    }
}

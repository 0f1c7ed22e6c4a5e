//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{constants, Result, TripfinError};

/// Tunables shared by the ledger, offer engines and settlement.
///
/// Every field has a default, so a partial JSON document is enough:
/// `{"lock_timeout_ms": 500}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long to wait for a wallet or trip lock before reporting
    /// `ConcurrencyConflict`.
    pub lock_timeout_ms: u64,
    /// Internal retries on `ConcurrencyConflict` before surfacing it.
    pub max_conflict_retries: u32,
    /// Bid validity when the lender doesn't set `expires_at`.
    pub bid_validity_hours: i64,
    /// Period of the background expiry sweep.
    pub expiry_sweep_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            max_conflict_retries: constants::DEFAULT_MAX_CONFLICT_RETRIES,
            bid_validity_hours: constants::DEFAULT_BID_VALIDITY_HOURS,
            expiry_sweep_interval_ms: constants::DEFAULT_EXPIRY_SWEEP_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_timeout_ms == 0 {
            return Err(TripfinError::Configuration(
                "lock_timeout_ms must be > 0".into(),
            ));
        }
        if self.bid_validity_hours <= 0 {
            return Err(TripfinError::Configuration(
                "bid_validity_hours must be > 0".into(),
            ));
        }
        if self.expiry_sweep_interval_ms == 0 {
            return Err(TripfinError::Configuration(
                "expiry_sweep_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    #[must_use]
    pub fn bid_validity(&self) -> chrono::Duration {
        chrono::Duration::hours(self.bid_validity_hours)
    }

    #[must_use]
    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_sweep_interval_ms)
    }
}

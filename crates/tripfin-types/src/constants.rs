//! System-wide constants for the TripFin financing core.

/// Fixed-point precision of every monetary amount (4 decimal places).
pub const AMOUNT_SCALE: u32 = 4;

/// Default wallet lock acquisition timeout in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 250;

/// Default number of internal retries on `ConcurrencyConflict`.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Default bid validity window when the lender doesn't supply one.
pub const DEFAULT_BID_VALIDITY_HOURS: i64 = 72;

/// Default period of the background bid expiry sweep in milliseconds.
pub const DEFAULT_EXPIRY_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Day-count basis for simple interest (ACT/365).
pub const DAYS_PER_YEAR: i64 = 365;

/// Minimum days charged on a repayment.
pub const MIN_DAYS_USED: i64 = 1;

/// Upper bound accepted for any percentage input (interest rate, fee, loan percent).
pub const MAX_PERCENT: i64 = 100;

/// Default currency for wallets provisioned without an explicit one.
pub const DEFAULT_CURRENCY: &str = "INR";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

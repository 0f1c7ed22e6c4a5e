//! Interfaces to the collaborators this core consults but does not own:
//! monetary-policy configuration, contract terms, and the trip directory.
//!
//! Each trait ships with a thread-safe in-memory adapter.

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ContractId, TripId, UserId};

// ---------------------------------------------------------------------------
// Fee configuration
// ---------------------------------------------------------------------------

/// Read-only view of the platform fee policy.
pub trait FeeConfigSource: Send + Sync {
    /// Platform fee as a percentage of principal. `None` means unset.
    fn platform_fee_percent(&self) -> Option<Decimal>;
}

/// Fee policy held in memory.
#[derive(Debug, Default)]
pub struct StaticFeeConfig {
    percent: RwLock<Option<Decimal>>,
}

impl StaticFeeConfig {
    #[must_use]
    pub fn new(percent: Option<Decimal>) -> Self {
        Self {
            percent: RwLock::new(percent),
        }
    }

    pub fn set(&self, percent: Option<Decimal>) {
        *self.percent.write() = percent;
    }
}

impl FeeConfigSource for StaticFeeConfig {
    fn platform_fee_percent(&self) -> Option<Decimal> {
        *self.percent.read()
    }
}

// ---------------------------------------------------------------------------
// Contract terms
// ---------------------------------------------------------------------------

/// Pre-agreed financing terms of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub contract_id: ContractId,
    /// Annual interest rate in percent.
    pub interest_rate: Decimal,
    /// Share of the trip invoice that gets financed, in percent.
    pub loan_percent: Decimal,
    pub maturity_days: u32,
}

pub trait ContractTermsSource: Send + Sync {
    fn terms(&self, contract_id: ContractId) -> Option<ContractTerms>;
}

#[derive(Debug, Default)]
pub struct InMemoryContracts {
    contracts: RwLock<HashMap<ContractId, ContractTerms>>,
}

impl InMemoryContracts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, terms: ContractTerms) {
        self.contracts.write().insert(terms.contract_id, terms);
    }
}

impl ContractTermsSource for InMemoryContracts {
    fn terms(&self, contract_id: ContractId) -> Option<ContractTerms> {
        self.contracts.read().get(&contract_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Trip directory
// ---------------------------------------------------------------------------

/// What the core needs to know about a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripInfo {
    pub trip_id: TripId,
    /// The transporter who created the trip.
    pub transporter_id: UserId,
    /// Invoice value of the trip.
    pub invoice_amount: Decimal,
}

pub trait TripDirectory: Send + Sync {
    fn trip(&self, trip_id: TripId) -> Option<TripInfo>;
}

#[derive(Debug, Default)]
pub struct InMemoryTrips {
    trips: RwLock<HashMap<TripId, TripInfo>>,
}

impl InMemoryTrips {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trip: TripInfo) {
        self.trips.write().insert(trip.trip_id, trip);
    }
}

impl TripDirectory for InMemoryTrips {
    fn trip(&self, trip_id: TripId) -> Option<TripInfo> {
        self.trips.read().get(&trip_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fee_is_none() {
        let fees = StaticFeeConfig::default();
        assert_eq!(fees.platform_fee_percent(), None);
        fees.set(Some(Decimal::new(2, 0)));
        assert_eq!(fees.platform_fee_percent(), Some(Decimal::new(2, 0)));
    }

    #[test]
    fn contract_lookup() {
        let contracts = InMemoryContracts::new();
        let id = ContractId::new();
        assert!(contracts.terms(id).is_none());
        contracts.insert(ContractTerms {
            contract_id: id,
            interest_rate: Decimal::new(12, 0),
            loan_percent: Decimal::new(80, 0),
            maturity_days: 60,
        });
        assert_eq!(contracts.terms(id).unwrap().maturity_days, 60);
    }

    #[test]
    fn trip_lookup() {
        let trips = InMemoryTrips::new();
        let trip = TripInfo {
            trip_id: TripId::new(),
            transporter_id: UserId::new(),
            invoice_amount: Decimal::new(250_000, 0),
        };
        trips.insert(trip);
        assert_eq!(trips.trip(trip.trip_id), Some(trip));
        assert_eq!(trips.trip(TripId::new()), None);
    }
}

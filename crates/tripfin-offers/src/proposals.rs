//! Proposal engine.
//!
//! A proposal says "I will finance this trip on that contract's terms".
//! Accepting one rejects every other PENDING proposal on the trip in the
//! same locked step, so exactly one survives as ACCEPTED.

use std::sync::Arc;

use tripfin_types::{
    AuditFields, Clock, ContractId, ContractTermsSource, EngineConfig, ProposalId,
    ProposalStatus, Result, TripDirectory, TripFinanceProposal, TripId, TripInfo, TripfinError,
    UserId,
};

use crate::trip_table::TripTable;

/// Outcome of an acceptance: the winner and the rivals it displaced.
#[derive(Debug, Clone)]
pub struct AcceptedProposal {
    pub proposal: TripFinanceProposal,
    pub rejected: Vec<ProposalId>,
}

pub struct ProposalEngine {
    table: TripTable<ProposalId, TripFinanceProposal>,
    trips: Arc<dyn TripDirectory>,
    contracts: Arc<dyn ContractTermsSource>,
    clock: Arc<dyn Clock>,
}

impl ProposalEngine {
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        trips: Arc<dyn TripDirectory>,
        contracts: Arc<dyn ContractTermsSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            table: TripTable::new(config.lock_timeout()),
            trips,
            contracts,
            clock,
        }
    }

    /// Create a PENDING proposal.
    ///
    /// # Errors
    /// - `TripNotFound`, `ContractNotFound`
    /// - `NotPermitted` if the transporter proposes on their own trip
    /// - `DuplicateProposal` if (trip, lender, contract) already exists, in any status
    /// - `AlreadyAccepted` if the trip already has an accepted proposal
    pub fn propose(
        &self,
        trip_id: TripId,
        lender_id: UserId,
        contract_id: ContractId,
    ) -> Result<TripFinanceProposal> {
        let trip = self.trip(trip_id)?;
        if trip.transporter_id == lender_id {
            return Err(TripfinError::not_permitted(
                "transporter cannot propose on own trip",
            ));
        }
        if self.contracts.terms(contract_id).is_none() {
            return Err(TripfinError::ContractNotFound(contract_id));
        }
        let now = self.clock.now();

        self.table.with_trip(trip_id, |proposals| {
            if proposals
                .iter()
                .any(|p| p.lender_id == lender_id && p.contract_id == contract_id)
            {
                return Err(TripfinError::DuplicateProposal {
                    trip: trip_id,
                    lender: lender_id,
                    contract: contract_id,
                });
            }
            if proposals.iter().any(|p| p.status == ProposalStatus::Accepted) {
                return Err(TripfinError::AlreadyAccepted(trip_id));
            }

            let proposal = TripFinanceProposal {
                id: ProposalId::new(),
                trip_id,
                lender_id,
                contract_id,
                status: ProposalStatus::Pending,
                proposed_at: now,
                responded_at: None,
                audit: AuditFields::new(now),
            };
            proposals.push(proposal.clone());
            self.table.register(proposal.id, trip_id);
            tracing::info!(
                proposal = %proposal.id,
                trip = %trip_id,
                lender = %lender_id,
                contract = %contract_id,
                "Proposal submitted"
            );
            Ok(proposal)
        })
    }

    /// PENDING → ACCEPTED, and every other PENDING proposal on the trip →
    /// REJECTED, atomically. Transporter only.
    pub fn accept(&self, proposal_id: ProposalId, transporter_id: UserId) -> Result<AcceptedProposal> {
        let (trip_id, trip) = self.locate(proposal_id)?;
        Self::require_transporter(&trip, transporter_id)?;
        let now = self.clock.now();

        self.table.with_trip(trip_id, |proposals| {
            let target = proposals
                .iter()
                .find(|p| p.id == proposal_id)
                .ok_or(TripfinError::ProposalNotFound(proposal_id))?;
            if proposals.iter().any(|p| p.status == ProposalStatus::Accepted) {
                tracing::warn!(proposal = %proposal_id, trip = %trip_id, "Acceptance lost: trip already has an accepted proposal");
                return Err(TripfinError::AlreadyAccepted(trip_id));
            }
            if !target.is_pending() {
                return Err(TripfinError::ProposalExpired(proposal_id));
            }

            let mut accepted = None;
            let mut rejected = Vec::new();
            for p in proposals.iter_mut() {
                if p.id == proposal_id {
                    p.transition(ProposalStatus::Accepted, now)?;
                    accepted = Some(p.clone());
                } else if p.is_pending() {
                    p.transition(ProposalStatus::Rejected, now)?;
                    rejected.push(p.id);
                }
            }
            let proposal = accepted.ok_or(TripfinError::ProposalNotFound(proposal_id))?;

            tracing::info!(
                proposal = %proposal_id,
                trip = %trip_id,
                lender = %proposal.lender_id,
                cascaded = rejected.len(),
                "Proposal accepted"
            );
            Ok(AcceptedProposal { proposal, rejected })
        })
    }

    /// PENDING → REJECTED for a single proposal. Transporter only.
    pub fn reject(&self, proposal_id: ProposalId, transporter_id: UserId) -> Result<TripFinanceProposal> {
        let (trip_id, trip) = self.locate(proposal_id)?;
        Self::require_transporter(&trip, transporter_id)?;
        self.close(trip_id, proposal_id, ProposalStatus::Rejected)
    }

    /// PENDING → WITHDRAWN. The proposing lender only.
    pub fn withdraw(&self, proposal_id: ProposalId, lender_id: UserId) -> Result<TripFinanceProposal> {
        let (trip_id, _) = self.locate(proposal_id)?;
        let owner = self.get(proposal_id)?.lender_id;
        if owner != lender_id {
            return Err(TripfinError::not_permitted(
                "only the proposing lender may withdraw",
            ));
        }
        self.close(trip_id, proposal_id, ProposalStatus::Withdrawn)
    }

    pub fn get(&self, proposal_id: ProposalId) -> Result<TripFinanceProposal> {
        let trip_id = self
            .table
            .trip_of(proposal_id)
            .ok_or(TripfinError::ProposalNotFound(proposal_id))?;
        self.table.with_trip(trip_id, |proposals| {
            proposals
                .iter()
                .find(|p| p.id == proposal_id)
                .cloned()
                .ok_or(TripfinError::ProposalNotFound(proposal_id))
        })
    }

    pub fn list_for_trip(&self, trip_id: TripId) -> Result<Vec<TripFinanceProposal>> {
        self.table.with_trip(trip_id, |proposals| Ok(proposals.clone()))
    }

    pub fn list_pending(&self, trip_id: TripId) -> Result<Vec<TripFinanceProposal>> {
        self.table.with_trip(trip_id, |proposals| {
            Ok(proposals.iter().filter(|p| p.is_pending()).cloned().collect())
        })
    }

    pub fn accepted_for_trip(&self, trip_id: TripId) -> Result<Option<TripFinanceProposal>> {
        self.table.with_trip(trip_id, |proposals| {
            Ok(proposals
                .iter()
                .find(|p| p.status == ProposalStatus::Accepted)
                .cloned())
        })
    }

    fn close(
        &self,
        trip_id: TripId,
        proposal_id: ProposalId,
        target: ProposalStatus,
    ) -> Result<TripFinanceProposal> {
        let now = self.clock.now();
        self.table.with_trip(trip_id, |proposals| {
            let proposal = proposals
                .iter_mut()
                .find(|p| p.id == proposal_id)
                .ok_or(TripfinError::ProposalNotFound(proposal_id))?;
            if !proposal.is_pending() {
                return Err(TripfinError::ProposalExpired(proposal_id));
            }
            proposal.transition(target, now)?;
            tracing::info!(proposal = %proposal_id, status = %target, "Proposal closed");
            Ok(proposal.clone())
        })
    }

    fn locate(&self, proposal_id: ProposalId) -> Result<(TripId, TripInfo)> {
        let trip_id = self
            .table
            .trip_of(proposal_id)
            .ok_or(TripfinError::ProposalNotFound(proposal_id))?;
        Ok((trip_id, self.trip(trip_id)?))
    }

    fn require_transporter(trip: &TripInfo, actor: UserId) -> Result<()> {
        if trip.transporter_id != actor {
            return Err(TripfinError::not_permitted(
                "only the trip's transporter may respond to proposals",
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

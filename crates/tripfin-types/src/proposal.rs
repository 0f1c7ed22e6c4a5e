//! Interest-to-finance proposals bound to a contract.
//!
//! ```text
//!   PENDING ──▶ ACCEPTED | REJECTED | WITHDRAWN   (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuditFields, ContractId, ProposalId, Result, TripId, TripfinError, UserId};

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ProposalStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Accepted | Self::Rejected | Self::Withdrawn)
        )
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Accepted => write!(f, "ACCEPTED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Withdrawn => write!(f, "WITHDRAWN"),
        }
    }
}

/// A lender's interest to finance a trip under a contract's terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFinanceProposal {
    pub id: ProposalId,
    pub trip_id: TripId,
    pub lender_id: UserId,
    pub contract_id: ContractId,
    pub status: ProposalStatus,
    pub proposed_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub audit: AuditFields,
}

impl TripFinanceProposal {
    /// Apply a status change through the transition table, stamping
    /// `responded_at`.
    pub fn transition(&mut self, target: ProposalStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(target) {
            return Err(TripfinError::InvalidTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.responded_at = Some(now);
        self.audit.touch(now);
        Ok(())
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> TripFinanceProposal {
        let now = Utc::now();
        TripFinanceProposal {
            id: ProposalId::new(),
            trip_id: TripId::new(),
            lender_id: UserId::new(),
            contract_id: ContractId::new(),
            status: ProposalStatus::Pending,
            proposed_at: now,
            responded_at: None,
            audit: AuditFields::new(now),
        }
    }

    #[test]
    fn pending_reaches_every_terminal() {
        for to in [
            ProposalStatus::Accepted,
            ProposalStatus::Rejected,
            ProposalStatus::Withdrawn,
        ] {
            assert!(ProposalStatus::Pending.can_transition_to(to));
            assert!(!to.can_transition_to(ProposalStatus::Pending));
        }
    }

    #[test]
    fn withdrawn_cannot_be_accepted() {
        let mut p = proposal();
        p.transition(ProposalStatus::Withdrawn, Utc::now()).unwrap();
        assert!(p.responded_at.is_some());
        assert!(p.transition(ProposalStatus::Accepted, Utc::now()).is_err());
    }
}

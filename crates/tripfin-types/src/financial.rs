//! The durable settlement record of a financed trip.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    AuditFields, BidId, ContractId, ProposalId, TransactionId, TripFinancialId, TripId, UserId,
};

/// Lifecycle status of a trip's financing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinancialStatus {
    Financed,
    Repaid,
    Defaulted,
}

impl FinancialStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Financed, Self::Repaid | Self::Defaulted)
        )
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Financed => write!(f, "FINANCED"),
            Self::Repaid => write!(f, "REPAID"),
            Self::Defaulted => write!(f, "DEFAULTED"),
        }
    }
}

/// Which accepted offer a financing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferRef {
    Bid(BidId),
    Proposal(ProposalId),
}

/// Principal / interest split of a completed repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentBreakdown {
    pub principal: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
}

/// Settlement record, one per trip.
///
/// Interest is always computed on `original_principal_amount`; the
/// transporter only ever received `net_amount_to_transporter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripFinancial {
    pub id: TripFinancialId,
    pub trip_id: TripId,
    pub offer: OfferRef,
    pub contract_id: Option<ContractId>,
    pub lender_id: UserId,
    pub transporter_id: UserId,
    pub financing_transaction_id: TransactionId,
    pub repayment_transaction_id: Option<TransactionId>,
    pub original_principal_amount: Decimal,
    pub platform_fee_amount: Decimal,
    pub net_amount_to_transporter: Decimal,
    pub interest_rate: Decimal,
    pub maturity_days: u32,
    pub financing_date: DateTime<Utc>,
    pub repayment_date: Option<DateTime<Utc>>,
    pub days_used: Option<i64>,
    pub calculated_interest: Option<Decimal>,
    pub repayment: Option<RepaymentBreakdown>,
    pub status: FinancialStatus,
    pub audit: AuditFields,
}

//! Settlement engine: financing and repayment of trips.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde_json::json;
use tripfin_ledger::TransactionCoordinator;
use tripfin_offers::{BidEngine, ProposalEngine};
use tripfin_types::{
    money, AuditFields, BidId, BidStatus, Clock, ContractId, ContractTermsSource, EngineConfig,
    FeeConfigSource, FinancialStatus, OfferRef, Posting, ProposalId, ProposalStatus,
    RepaymentBreakdown, Result, TransactionType, TripDirectory, TripFinancial, TripFinancialId,
    TripId, TripInfo, TripfinError, UserId, WalletId,
};

use crate::{guard::FinancingGuard, interest};

/// Everything the engine consults but does not own.
pub struct SettlementParts {
    pub coordinator: Arc<TransactionCoordinator>,
    pub bids: Arc<BidEngine>,
    pub proposals: Arc<ProposalEngine>,
    pub trips: Arc<dyn TripDirectory>,
    pub contracts: Arc<dyn ContractTermsSource>,
    pub fees: Arc<dyn FeeConfigSource>,
    pub clock: Arc<dyn Clock>,
}

/// Resolved terms of an accepted offer, ready to settle.
struct FinancingPlan {
    trip: TripInfo,
    offer: OfferRef,
    contract_id: Option<ContractId>,
    lender_id: UserId,
    principal: Decimal,
    interest_rate: Decimal,
    maturity_days: u32,
}

pub struct SettlementEngine {
    coordinator: Arc<TransactionCoordinator>,
    bids: Arc<BidEngine>,
    proposals: Arc<ProposalEngine>,
    trips: Arc<dyn TripDirectory>,
    contracts: Arc<dyn ContractTermsSource>,
    fees: Arc<dyn FeeConfigSource>,
    clock: Arc<dyn Clock>,
    platform_wallet: WalletId,
    guard: FinancingGuard,
    financials: RwLock<HashMap<TripId, Arc<Mutex<TripFinancial>>>>,
    lock_timeout: Duration,
}

impl SettlementEngine {
    /// # Errors
    /// [`TripfinError::WalletNotFound`] if the platform fee wallet is not
    /// provisioned in the coordinator's ledger.
    pub fn new(config: &EngineConfig, parts: SettlementParts, platform_wallet: WalletId) -> Result<Self> {
        parts.coordinator.ledger().wallet(platform_wallet)?;
        Ok(Self {
            coordinator: parts.coordinator,
            bids: parts.bids,
            proposals: parts.proposals,
            trips: parts.trips,
            contracts: parts.contracts,
            fees: parts.fees,
            clock: parts.clock,
            platform_wallet,
            guard: FinancingGuard::new(),
            financials: RwLock::new(HashMap::new()),
            lock_timeout: config.lock_timeout(),
        })
    }

    /// Finance a trip from its ACCEPTED bid, on the bid's standing terms.
    pub fn finance_bid(&self, bid_id: BidId) -> Result<TripFinancial> {
        let bid = self.bids.get_bid(bid_id)?;
        if bid.status != BidStatus::Accepted {
            return Err(TripfinError::validation(format!(
                "bid {bid_id} is {}, not ACCEPTED",
                bid.status
            )));
        }
        let terms = bid.standing_terms();
        let plan = FinancingPlan {
            trip: self.trip(bid.trip_id)?,
            offer: OfferRef::Bid(bid_id),
            contract_id: None,
            lender_id: bid.lender_id,
            principal: terms.amount,
            interest_rate: terms.interest_rate,
            maturity_days: terms.maturity_days,
        };
        self.finance(&plan)
    }

    /// Finance a trip from its ACCEPTED proposal. Principal is the trip's
    /// invoice amount times the contract's loan percent.
    pub fn finance_proposal(&self, proposal_id: ProposalId) -> Result<TripFinancial> {
        let proposal = self.proposals.get(proposal_id)?;
        if proposal.status != ProposalStatus::Accepted {
            return Err(TripfinError::validation(format!(
                "proposal {proposal_id} is {}, not ACCEPTED",
                proposal.status
            )));
        }
        let terms = self
            .contracts
            .terms(proposal.contract_id)
            .ok_or(TripfinError::ContractNotFound(proposal.contract_id))?;
        money::validate_percent("loan percent", terms.loan_percent)?;
        let trip = self.trip(proposal.trip_id)?;
        let plan = FinancingPlan {
            principal: money::percent_of(trip.invoice_amount, terms.loan_percent),
            trip,
            offer: OfferRef::Proposal(proposal_id),
            contract_id: Some(proposal.contract_id),
            lender_id: proposal.lender_id,
            interest_rate: terms.interest_rate,
            maturity_days: terms.maturity_days,
        };
        self.finance(&plan)
    }

    /// Settle a FINANCED trip: move principal + interest from the
    /// transporter back to the lender and mark the record REPAID. The fee
    /// is not refunded.
    pub fn repay(&self, trip_id: TripId, repayment_date: DateTime<Utc>) -> Result<TripFinancial> {
        let slot = self.slot(trip_id)?;
        let mut record = slot
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| TripfinError::conflict(format!("trip financial {trip_id}")))?;
        Self::require_transition(&record, FinancialStatus::Repaid)?;

        let days = interest::days_used(record.financing_date, repayment_date)?;
        let principal = record.original_principal_amount;
        let calculated = interest::calculate_interest(principal, record.interest_rate, days);
        let total = principal + calculated;

        let ledger = self.coordinator.ledger();
        let transporter_wallet = ledger.wallet_for_user(record.transporter_id)?.id;
        let lender_wallet = ledger.wallet_for_user(record.lender_id)?.id;

        let tx = self.coordinator.execute(
            TransactionType::Repayment,
            json!({
                "trip_id": trip_id.to_string(),
                "principal": principal.to_string(),
                "interest": calculated.to_string(),
                "days_used": days,
            }),
            &[
                Posting::debit(transporter_wallet, total),
                Posting::credit(lender_wallet, total),
            ],
        )?;

        record.repayment_transaction_id = Some(tx.id);
        record.repayment_date = Some(repayment_date);
        record.days_used = Some(days);
        record.calculated_interest = Some(calculated);
        record.repayment = Some(RepaymentBreakdown {
            principal,
            interest: calculated,
            total,
        });
        record.status = FinancialStatus::Repaid;
        record.audit.touch(self.clock.now());

        tracing::info!(
            trip = %trip_id,
            tx = %tx.id,
            principal = %principal,
            interest = %calculated,
            days_used = days,
            "Trip repaid"
        );
        Ok(record.clone())
    }

    /// FINANCED → DEFAULTED. No funds move.
    pub fn mark_defaulted(&self, trip_id: TripId) -> Result<TripFinancial> {
        let slot = self.slot(trip_id)?;
        let mut record = slot
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| TripfinError::conflict(format!("trip financial {trip_id}")))?;
        Self::require_transition(&record, FinancialStatus::Defaulted)?;
        record.status = FinancialStatus::Defaulted;
        record.audit.touch(self.clock.now());
        tracing::warn!(trip = %trip_id, lender = %record.lender_id, "Trip financing defaulted");
        Ok(record.clone())
    }

    pub fn get_trip_financial(&self, trip_id: TripId) -> Result<TripFinancial> {
        let slot = self.slot(trip_id)?;
        let record = slot
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| TripfinError::conflict(format!("trip financial {trip_id}")))?;
        Ok(record.clone())
    }

    pub fn financed_count(&self) -> usize {
        self.financials.read().len()
    }

    pub fn platform_wallet(&self) -> WalletId {
        self.platform_wallet
    }

    fn finance(&self, plan: &FinancingPlan) -> Result<TripFinancial> {
        money::validate_amount(plan.principal)?;
        let fee = interest::platform_fee(plan.principal, self.fees.platform_fee_percent())?;
        let net = plan.principal - fee;
        if net <= Decimal::ZERO {
            return Err(TripfinError::validation(format!(
                "net amount to transporter must be positive, got {net}"
            )));
        }

        let trip_id = plan.trip.trip_id;
        self.guard.reserve(trip_id)?;
        match self.post_financing(plan, fee, net) {
            Ok(record) => {
                self.financials
                    .write()
                    .insert(trip_id, Arc::new(Mutex::new(record.clone())));
                self.guard.commit(trip_id);
                tracing::info!(
                    trip = %trip_id,
                    lender = %plan.lender_id,
                    principal = %plan.principal,
                    fee = %fee,
                    net = %net,
                    tx = %record.financing_transaction_id,
                    "Trip financed"
                );
                Ok(record)
            }
            Err(err) => {
                self.guard.release(trip_id);
                tracing::warn!(trip = %trip_id, error = %err, "Financing aborted");
                Err(err)
            }
        }
    }

    fn post_financing(&self, plan: &FinancingPlan, fee: Decimal, net: Decimal) -> Result<TripFinancial> {
        let ledger = self.coordinator.ledger();
        let lender_wallet = ledger.wallet_for_user(plan.lender_id)?.id;
        let transporter_wallet = ledger.wallet_for_user(plan.trip.transporter_id)?.id;

        let mut postings = vec![
            Posting::debit(lender_wallet, plan.principal),
            Posting::credit(transporter_wallet, net),
        ];
        if fee > Decimal::ZERO {
            postings.push(Posting::credit(self.platform_wallet, fee));
        }

        let offer = match plan.offer {
            OfferRef::Bid(id) => id.to_string(),
            OfferRef::Proposal(id) => id.to_string(),
        };
        let tx = self.coordinator.execute(
            TransactionType::Financing,
            json!({
                "trip_id": plan.trip.trip_id.to_string(),
                "offer": offer,
                "principal": plan.principal.to_string(),
                "platform_fee": fee.to_string(),
            }),
            &postings,
        )?;
        // Money has moved; nothing below may fail.
        let financing_date = tx.completed_at.unwrap_or(tx.created_at);

        Ok(TripFinancial {
            id: TripFinancialId::new(),
            trip_id: plan.trip.trip_id,
            offer: plan.offer,
            contract_id: plan.contract_id,
            lender_id: plan.lender_id,
            transporter_id: plan.trip.transporter_id,
            financing_transaction_id: tx.id,
            repayment_transaction_id: None,
            original_principal_amount: plan.principal,
            platform_fee_amount: fee,
            net_amount_to_transporter: net,
            interest_rate: plan.interest_rate,
            maturity_days: plan.maturity_days,
            financing_date,
            repayment_date: None,
            days_used: None,
            calculated_interest: None,
            repayment: None,
            status: FinancialStatus::Financed,
            audit: AuditFields::new(financing_date),
        })
    }

    fn require_transition(record: &TripFinancial, target: FinancialStatus) -> Result<()> {
        if !record.status.can_transition_to(target) {
            return Err(TripfinError::InvalidTransition {
                from: record.status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    fn slot(&self, trip_id: TripId) -> Result<Arc<Mutex<TripFinancial>>> {
        self.financials
            .read()
            .get(&trip_id)
            .cloned()
            .ok_or(TripfinError::TripFinancialNotFound(trip_id))
    }

    fn trip(&self, trip_id: TripId) -> Result<TripInfo> {
        self.trips
            .trip(trip_id)
            .ok_or(TripfinError::TripNotFound(trip_id))
    }
}

//! Error types for the TripFin financing core.
//!
//! All errors use the `TF_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation errors
//! - 2xx: Wallet / ledger errors
//! - 3xx: Transaction errors
//! - 4xx: Bid errors
//! - 5xx: Proposal errors
//! - 6xx: Settlement errors
//! - 7xx: Concurrency errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    BidId, ContractId, ProposalId, TransactionId, TransactionStatus, TripId, UserId, WalletId,
    WalletStatus,
};

/// Central error enum for all TripFin operations.
#[derive(Debug, Error)]
pub enum TripfinError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// Malformed or out-of-range input, or a non-positive computed amount.
    #[error("TF_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// The actor is not a party allowed to perform this action.
    #[error("TF_ERR_101: Not permitted: {reason}")]
    NotPermitted { reason: String },

    /// The requested state transition is not in the transition table.
    #[error("TF_ERR_102: Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // =================================================================
    // Wallet / Ledger Errors (2xx)
    // =================================================================
    /// No wallet exists with this ID.
    #[error("TF_ERR_200: Wallet not found: {0}")]
    WalletNotFound(WalletId),

    /// No wallet has been provisioned for this user.
    #[error("TF_ERR_201: No wallet for user: {0}")]
    WalletNotProvisioned(UserId),

    /// The user already owns a wallet.
    #[error("TF_ERR_202: Wallet already exists for user {0}")]
    DuplicateWallet(UserId),

    /// A DEBIT would drive a non-overdraft wallet negative.
    #[error("TF_ERR_203: Insufficient funds in {wallet}: need {needed}, have {available}")]
    InsufficientFunds {
        wallet: WalletId,
        needed: Decimal,
        available: Decimal,
    },

    /// The wallet is SUSPENDED or CLOSED.
    #[error("TF_ERR_204: Wallet {wallet} is {status}")]
    WalletNotActive {
        wallet: WalletId,
        status: WalletStatus,
    },

    /// The cached balance snapshot disagrees with the full entry history.
    #[error("TF_ERR_205: Ledger invariant violation: {reason}")]
    LedgerInvariantViolation { reason: String },

    /// Σ balances ≠ Σ deposits − Σ withdrawals.
    #[error("TF_ERR_206: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    // =================================================================
    // Transaction Errors (3xx)
    // =================================================================
    /// No transaction exists with this ID.
    #[error("TF_ERR_300: Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// The transaction is already COMPLETED or FAILED.
    #[error("TF_ERR_301: Transaction {id} is {status}")]
    TransactionTerminal {
        id: TransactionId,
        status: TransactionStatus,
    },

    /// Σ debits ≠ Σ credits for a type that must balance.
    #[error("TF_ERR_302: Unbalanced postings: debits {debits}, credits {credits}")]
    UnbalancedPostings { debits: Decimal, credits: Decimal },

    // =================================================================
    // Bid Errors (4xx)
    // =================================================================
    /// No bid exists with this ID.
    #[error("TF_ERR_400: Bid not found: {0}")]
    BidNotFound(BidId),

    /// The lender already holds an active bid on this trip.
    #[error("TF_ERR_401: Lender {lender} already has an active bid on {trip}")]
    DuplicateBid { trip: TripId, lender: UserId },

    /// The bid is past its expiry or in a terminal state.
    #[error("TF_ERR_402: Bid {0} is expired or closed")]
    BidExpired(BidId),

    /// Another bid or proposal on this trip already won.
    #[error("TF_ERR_403: Trip {0} already has an accepted offer")]
    AlreadyAccepted(TripId),

    // =================================================================
    // Proposal Errors (5xx)
    // =================================================================
    /// No proposal exists with this ID.
    #[error("TF_ERR_500: Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    /// The (trip, lender, contract) triple is already taken.
    #[error("TF_ERR_501: Proposal already exists for {trip}, lender {lender}, {contract}")]
    DuplicateProposal {
        trip: TripId,
        lender: UserId,
        contract: ContractId,
    },

    /// The proposal is in a terminal state.
    #[error("TF_ERR_502: Proposal {0} is closed")]
    ProposalExpired(ProposalId),

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// The trip already has a TripFinancial.
    #[error("TF_ERR_600: Trip already financed: {0}")]
    AlreadyFinanced(TripId),

    /// The trip directory does not know this trip.
    #[error("TF_ERR_601: Trip not found: {0}")]
    TripNotFound(TripId),

    /// The contract terms source does not know this contract.
    #[error("TF_ERR_602: Contract not found: {0}")]
    ContractNotFound(ContractId),

    /// No TripFinancial exists for the trip.
    #[error("TF_ERR_603: Trip financial not found for {0}")]
    TripFinancialNotFound(TripId),

    // =================================================================
    // Concurrency Errors (7xx)
    // =================================================================
    /// Lock acquisition timed out or a competing operation is in flight.
    /// Safe to retry.
    #[error("TF_ERR_700: Concurrency conflict on {resource}")]
    ConcurrencyConflict { resource: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("TF_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid config document, out-of-range values).
    #[error("TF_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl TripfinError {
    /// Shorthand for [`TripfinError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TripfinError::NotPermitted`].
    pub fn not_permitted(reason: impl Into<String>) -> Self {
        Self::NotPermitted {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TripfinError::ConcurrencyConflict`].
    pub fn conflict(resource: impl std::fmt::Display) -> Self {
        Self::ConcurrencyConflict {
            resource: resource.to_string(),
        }
    }

    /// Only lock contention is worth retrying; everything else is terminal
    /// for the attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Whether this is one of the `NotFound` class errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WalletNotFound(_)
                | Self::WalletNotProvisioned(_)
                | Self::TransactionNotFound(_)
                | Self::BidNotFound(_)
                | Self::ProposalNotFound(_)
                | Self::TripNotFound(_)
                | Self::ContractNotFound(_)
                | Self::TripFinancialNotFound(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TripfinError>;

impl From<serde_json::Error> for TripfinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

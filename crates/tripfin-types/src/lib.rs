//! # tripfin-types
//!
//! Shared records, errors, and configuration for the **TripFin** trip
//! invoice-financing core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`WalletId`], [`UserId`], [`TransactionId`], [`TripId`], [`BidId`], [`ProposalId`], [`ContractId`]
//! - **Ledger model**: [`Wallet`], [`Transaction`], [`TransactionEntry`], [`Posting`], [`EntryType`]
//! - **Offer model**: [`TripBid`], [`BidStatus`], [`TripFinanceProposal`], [`ProposalStatus`]
//! - **Settlement model**: [`TripFinancial`], [`FinancialStatus`], [`RepaymentBreakdown`]
//! - **Collaborators**: [`FeeConfigSource`], [`ContractTermsSource`], [`TripDirectory`], [`Clock`]
//! - **Configuration**: [`EngineConfig`]
//! - **Errors**: [`TripfinError`] with `TF_ERR_` prefix codes

pub mod audit;
pub mod bid;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod financial;
pub mod ids;
pub mod money;
pub mod proposal;
pub mod transaction;
pub mod wallet;

pub use audit::*;
pub use bid::*;
pub use clock::*;
pub use collaborators::*;
pub use config::*;
pub use error::*;
pub use financial::*;
pub use ids::*;
pub use proposal::*;
pub use transaction::*;
pub use wallet::*;

// Constants and money helpers are accessed by module path
// (`tripfin_types::constants::FOO`, `tripfin_types::money::round_amount`).

//! # tripfin-ledger
//!
//! **Money plane**: the append-only wallet ledger and the coordinator that
//! groups postings into all-or-nothing transactions.
//!
//! ## Architecture
//!
//! 1. **LedgerStore**: per-wallet entry history; a wallet's balance is the
//!    `balance_after` snapshot of its newest entry
//! 2. **TransactionCoordinator**: opens transactions, applies multi-wallet
//!    postings, drives PENDING → COMPLETED | FAILED
//! 3. **SupplyTracker**: Σ balances must equal Σ deposits − Σ withdrawals
//! 4. **receipt**: SHA-256 digest over a completed transaction's entries
//!
//! ## Locking
//!
//! Every balance-affecting call holds the wallet's lock across the
//! read-modify-append sequence. Multi-wallet postings lock in ascending
//! [`WalletId`](tripfin_types::WalletId) order, which is a total order
//! shared by every caller, so overlapping transfers can't deadlock.

pub mod coordinator;
pub mod receipt;
pub mod store;
pub mod supply;

pub use coordinator::TransactionCoordinator;
pub use store::LedgerStore;
pub use supply::SupplyTracker;

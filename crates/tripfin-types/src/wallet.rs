//! Wallet identity and status.
//!
//! A wallet carries no balance field: its balance is the `balance_after`
//! snapshot of its most recent ledger entry.

use serde::{Deserialize, Serialize};

use crate::{AuditFields, UserId, WalletId};

/// Lifecycle status of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletStatus {
    Active,
    Suspended,
    Closed,
}

impl WalletStatus {
    /// Only ACTIVE wallets accept postings.
    #[must_use]
    pub fn accepts_postings(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Provisioning options for a new wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletOptions {
    /// Allow DEBITs to drive the balance negative. Only set explicitly,
    /// e.g. for the platform fee-collection wallet.
    pub overdraft: bool,
}

/// A per-user wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub currency_code: String,
    pub status: WalletStatus,
    pub overdraft: bool,
    pub audit: AuditFields,
}

//! Globally unique identifiers used throughout TripFin.
//!
//! All entity IDs wrap a UUIDv7, so they sort by creation time. The total
//! order on [`WalletId`] is also the global lock order for multi-wallet
//! postings.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

entity_id!(
    /// A platform user (lender, transporter, or the platform itself).
    UserId,
    "user"
);

entity_id!(
    /// A wallet. Exactly one per user.
    WalletId,
    "wallet"
);

entity_id!(
    /// A logical money-movement transaction.
    TransactionId,
    "tx"
);

entity_id!(
    /// A single immutable ledger posting.
    EntryId,
    "entry"
);

entity_id!(
    /// A transport trip whose invoice is being financed.
    TripId,
    "trip"
);

entity_id!(
    /// A lender bid against a trip.
    BidId,
    "bid"
);

entity_id!(
    /// A lender's interest-to-finance proposal.
    ProposalId,
    "proposal"
);

entity_id!(
    /// A financing contract carrying pre-agreed terms.
    ContractId,
    "contract"
);

entity_id!(
    /// The lending company a bid is placed on behalf of.
    CompanyId,
    "company"
);

entity_id!(
    /// The settlement record of a financed trip.
    TripFinancialId,
    "financial"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(WalletId::new(), WalletId::new());
        assert_ne!(TripId::new(), TripId::new());
    }

    #[test]
    fn wallet_ids_order_by_creation() {
        let a = WalletId::new();
        let b = WalletId::new();
        assert!(a < b);
    }

    #[test]
    fn display_carries_prefix() {
        let id = BidId::from_bytes([0u8; 16]);
        assert_eq!(id.to_string(), "bid:00000000-0000-0000-0000-000000000000");
        assert!(TransactionId::new().to_string().starts_with("tx:"));
    }

    #[test]
    fn serde_is_transparent_uuid() {
        let id = TripId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: TripId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

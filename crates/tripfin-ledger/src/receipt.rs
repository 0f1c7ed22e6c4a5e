//! Audit digest over a transaction's entries.
//!
//! `SHA-256("tripfin:tx-receipt:v1:" || tx_id || for each entry:
//! wallet_id || type || amount || balance_after || sequence)`
//!
//! Entries are hashed in (wallet, sequence) order, so the digest doesn't
//! depend on how the caller ordered its postings.

use sha2::{Digest, Sha256};
use tripfin_types::{EntryType, TransactionEntry, TransactionId};

/// Hex-encoded receipt digest for a transaction.
#[must_use]
pub fn entries_digest(transaction_id: TransactionId, entries: &[TransactionEntry]) -> String {
    let mut ordered: Vec<&TransactionEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| (e.wallet_id, e.entry_sequence));

    let mut hasher = Sha256::new();
    hasher.update(b"tripfin:tx-receipt:v1:");
    hasher.update(transaction_id.0.as_bytes());
    for entry in ordered {
        hasher.update(entry.wallet_id.0.as_bytes());
        hasher.update(match entry.entry_type {
            EntryType::Credit => b"C",
            EntryType::Debit => b"D",
        });
        hasher.update(entry.amount.normalize().to_string().as_bytes());
        hasher.update(entry.balance_after.normalize().to_string().as_bytes());
        hasher.update(entry.entry_sequence.to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

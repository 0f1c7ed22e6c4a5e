//! Transaction and ledger-entry records.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  complete   ┌───────────┐
//!   │ PENDING ├────────────▶│ COMPLETED │
//!   └────┬────┘             └───────────┘
//!        │ fail
//!        ▼
//!   ┌────────┐
//!   │ FAILED │
//!   └────────┘
//! ```
//!
//! Entries are append-only: there is no way to update or delete one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{EntryId, Result, TransactionId, TripfinError, WalletId};

/// Direction of a ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    /// Balance after applying `amount` in this direction.
    #[must_use]
    pub fn apply(self, balance: Decimal, amount: Decimal) -> Decimal {
        match self {
            Self::Credit => balance + amount,
            Self::Debit => balance - amount,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credit => write!(f, "CREDIT"),
            Self::Debit => write!(f, "DEBIT"),
        }
    }
}

/// What a transaction is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Financing,
    Repayment,
    ManualTransfer,
    /// Funds entering the platform from outside (single-sided CREDIT).
    Deposit,
    /// Funds leaving the platform (single-sided DEBIT).
    Withdrawal,
}

impl TransactionType {
    /// Deposits and withdrawals move money across the platform boundary and
    /// are the only types allowed to post one-sided.
    #[must_use]
    pub fn is_external(self) -> bool {
        matches!(self, Self::Deposit | Self::Withdrawal)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Financing => write!(f, "FINANCING"),
            Self::Repayment => write!(f, "REPAYMENT"),
            Self::ManualTransfer => write!(f, "MANUAL_TRANSFER"),
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Withdrawal => write!(f, "WITHDRAWAL"),
        }
    }
}

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A logical unit of money movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    /// Free-form caller metadata (trip id, bid id, operator note, ...).
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Hex SHA-256 over the transaction's entries, stamped on completion.
    pub receipt_digest: Option<String>,
}

impl Transaction {
    /// Move to a terminal status. Returns `false` (and changes nothing) if
    /// the transaction is already terminal.
    pub fn finish(
        &mut self,
        status: TransactionStatus,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.completed_at = Some(at);
        self.failure_reason = reason;
        true
    }
}

/// One immutable posting against one wallet within one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: EntryId,
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub entry_type: EntryType,
    pub amount: Decimal,
    /// Wallet balance immediately after this entry.
    pub balance_after: Decimal,
    /// 1-based sequence within `(transaction_id, wallet_id)`.
    pub entry_sequence: u32,
    pub created_at: DateTime<Utc>,
}

impl TransactionEntry {
    /// Signed effect of this entry on its wallet's balance.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

/// A requested posting, before it becomes an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub wallet_id: WalletId,
    pub entry_type: EntryType,
    pub amount: Decimal,
}

impl Posting {
    #[must_use]
    pub fn debit(wallet_id: WalletId, amount: Decimal) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    #[must_use]
    pub fn credit(wallet_id: WalletId, amount: Decimal) -> Self {
        Self {
            wallet_id,
            entry_type: EntryType::Credit,
            amount,
        }
    }
}

/// Σ debits and Σ credits of a posting list.
#[must_use]
pub fn posting_totals(postings: &[Posting]) -> (Decimal, Decimal) {
    postings
        .iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(debits, credits), p| {
            match p.entry_type {
                EntryType::Debit => (debits + p.amount, credits),
                EntryType::Credit => (debits, credits + p.amount),
            }
        })
}

/// Fail with [`TripfinError::UnbalancedPostings`] unless Σ debits = Σ credits.
pub fn ensure_balanced(postings: &[Posting]) -> Result<()> {
    let (debits, credits) = posting_totals(postings);
    if debits != credits {
        return Err(TripfinError::UnbalancedPostings { debits, credits });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Transaction {
        Transaction {
            id: TransactionId::new(),
            tx_type: TransactionType::Financing,
            status: TransactionStatus::Pending,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
            receipt_digest: None,
        }
    }

    #[test]
    fn transitions_valid() {
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Completed));
        assert!(TransactionStatus::Pending.can_transition_to(TransactionStatus::Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        for from in [TransactionStatus::Completed, TransactionStatus::Failed] {
            assert!(from.is_terminal());
            for to in [
                TransactionStatus::Pending,
                TransactionStatus::Completed,
                TransactionStatus::Failed,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must fail");
            }
        }
    }

    #[test]
    fn finish_is_one_shot() {
        let mut tx = pending();
        let at = Utc::now();
        assert!(tx.finish(TransactionStatus::Completed, at, None));
        assert!(!tx.finish(TransactionStatus::Failed, at, Some("late".into())));
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.failure_reason, None);
    }

    #[test]
    fn balanced_postings() {
        let (a, b, c) = (WalletId::new(), WalletId::new(), WalletId::new());
        let postings = [
            Posting::debit(a, Decimal::new(100_000, 0)),
            Posting::credit(b, Decimal::new(98_000, 0)),
            Posting::credit(c, Decimal::new(2_000, 0)),
        ];
        assert!(ensure_balanced(&postings).is_ok());

        let err = ensure_balanced(&postings[..2]).unwrap_err();
        assert!(matches!(err, TripfinError::UnbalancedPostings { .. }));
    }

    #[test]
    fn entry_type_apply() {
        let bal = Decimal::new(100, 0);
        assert_eq!(EntryType::Credit.apply(bal, Decimal::new(50, 0)), Decimal::new(150, 0));
        assert_eq!(EntryType::Debit.apply(bal, Decimal::new(150, 0)), Decimal::new(-50, 0));
    }
}

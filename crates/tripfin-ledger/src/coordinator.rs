//! Transaction coordinator.
//!
//! Groups ledger postings into a [`Transaction`] and drives its lifecycle:
//! 1. `open` creates a PENDING transaction
//! 2. `post_multi` applies postings through the [`LedgerStore`], all or nothing
//! 3. `complete` / `fail` close it; both are idempotent on terminal state
//!
//! Each transaction sits behind its own lock, held from the status check
//! through the append and the recording of the entries, and taken by
//! `complete` / `fail` as well. Posting into a closed transaction and
//! closing one mid-posting are therefore impossible. A transaction that
//! holds entries can only complete: entries are never rolled back, so it
//! is never reported FAILED.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tripfin_types::{
    ensure_balanced, Clock, EngineConfig, EntryType, Posting, Result, Transaction,
    TransactionEntry, TransactionId, TransactionStatus, TransactionType, TripfinError, WalletId,
};

use crate::{receipt, store::LedgerStore, supply::SupplyTracker};

/// A transaction and the entries posted under it.
#[derive(Debug)]
struct TxRecord {
    tx: Transaction,
    entries: Vec<TransactionEntry>,
}

pub struct TransactionCoordinator {
    ledger: Arc<LedgerStore>,
    transactions: RwLock<HashMap<TransactionId, Arc<Mutex<TxRecord>>>>,
    supply: Mutex<SupplyTracker>,
    clock: Arc<dyn Clock>,
    max_conflict_retries: u32,
}

impl TransactionCoordinator {
    #[must_use]
    pub fn new(ledger: Arc<LedgerStore>, config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            transactions: RwLock::new(HashMap::new()),
            supply: Mutex::new(SupplyTracker::new()),
            clock,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    /// Create a PENDING transaction.
    pub fn open(&self, tx_type: TransactionType, metadata: serde_json::Value) -> Transaction {
        let tx = Transaction {
            id: TransactionId::new(),
            tx_type,
            status: TransactionStatus::Pending,
            metadata,
            created_at: self.clock.now(),
            completed_at: None,
            failure_reason: None,
            receipt_digest: None,
        };
        let record = TxRecord {
            tx: tx.clone(),
            entries: Vec::new(),
        };
        self.transactions
            .write()
            .insert(tx.id, Arc::new(Mutex::new(record)));
        tracing::debug!(tx = %tx.id, tx_type = %tx_type, "Transaction opened");
        tx
    }

    /// Apply `postings` to a PENDING transaction.
    ///
    /// Internal types (financing, repayment, manual transfer) must balance.
    /// Deposits may only credit and withdrawals may only debit.
    /// Lock contention is retried up to `max_conflict_retries` times.
    ///
    /// # Errors
    /// - `TransactionNotFound` / `TransactionTerminal`
    /// - `UnbalancedPostings`, `Validation`
    /// - anything [`LedgerStore::post_batch`] reports
    pub fn post_multi(
        &self,
        transaction_id: TransactionId,
        postings: &[Posting],
    ) -> Result<Vec<TransactionEntry>> {
        let record = self.record(transaction_id)?;
        let mut record = record.lock();
        self.post_locked(&mut record, postings)
    }

    /// PENDING → COMPLETED. Stamps the receipt digest.
    ///
    /// Completing an already-terminal transaction changes nothing and
    /// returns its existing status.
    pub fn complete(&self, transaction_id: TransactionId) -> Result<TransactionStatus> {
        let record = self.record(transaction_id)?;
        let mut record = record.lock();
        Ok(self.complete_locked(&mut record))
    }

    /// PENDING → FAILED with a reason. Idempotent like [`Self::complete`].
    ///
    /// # Errors
    /// `InvalidTransition` if entries were already posted under the
    /// transaction; it can only complete.
    pub fn fail(&self, transaction_id: TransactionId, reason: &str) -> Result<TransactionStatus> {
        let record = self.record(transaction_id)?;
        let mut record = record.lock();
        self.fail_locked(&mut record, reason)
    }

    pub fn get(&self, transaction_id: TransactionId) -> Result<Transaction> {
        Ok(self.record(transaction_id)?.lock().tx.clone())
    }

    /// Entries posted under a transaction, in posting order.
    pub fn entries(&self, transaction_id: TransactionId) -> Result<Vec<TransactionEntry>> {
        Ok(self.record(transaction_id)?.lock().entries.clone())
    }

    /// Open, post and close in one call.
    ///
    /// On a posting error the transaction is marked FAILED, nothing was
    /// appended, and the error is returned. Once postings are in, the call
    /// returns the COMPLETED transaction.
    pub fn execute(
        &self,
        tx_type: TransactionType,
        metadata: serde_json::Value,
        postings: &[Posting],
    ) -> Result<Transaction> {
        let opened = self.open(tx_type, metadata);
        let record = self.record(opened.id)?;
        let mut record = record.lock();
        if let Err(err) = self.post_locked(&mut record, postings) {
            self.fail_locked(&mut record, &err.to_string())?;
            return Err(err);
        }
        self.complete_locked(&mut record);
        Ok(record.tx.clone())
    }

    /// Move `amount` between two wallets as a MANUAL_TRANSFER.
    pub fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: Decimal,
        metadata: serde_json::Value,
    ) -> Result<Transaction> {
        if from == to {
            return Err(TripfinError::validation("cannot transfer to the same wallet"));
        }
        self.execute(
            TransactionType::ManualTransfer,
            metadata,
            &[Posting::debit(from, amount), Posting::credit(to, amount)],
        )
    }

    /// Credit external funds into a wallet.
    pub fn deposit(
        &self,
        wallet: WalletId,
        amount: Decimal,
        metadata: serde_json::Value,
    ) -> Result<Transaction> {
        self.execute(
            TransactionType::Deposit,
            metadata,
            &[Posting::credit(wallet, amount)],
        )
    }

    /// Debit funds out of the platform.
    pub fn withdraw(
        &self,
        wallet: WalletId,
        amount: Decimal,
        metadata: serde_json::Value,
    ) -> Result<Transaction> {
        self.execute(
            TransactionType::Withdrawal,
            metadata,
            &[Posting::debit(wallet, amount)],
        )
    }

    /// Check Σ balances = Σ deposits − Σ withdrawals for a currency.
    pub fn verify_supply(&self, currency_code: &str) -> Result<()> {
        let actual = self.ledger.total_balance(currency_code)?;
        self.supply.lock().verify(currency_code, actual)
    }

    fn record(&self, transaction_id: TransactionId) -> Result<Arc<Mutex<TxRecord>>> {
        self.transactions
            .read()
            .get(&transaction_id)
            .cloned()
            .ok_or(TripfinError::TransactionNotFound(transaction_id))
    }

    /// Everything fallible happens before the ledger appends; after
    /// `post_batch` succeeds nothing here can fail.
    fn post_locked(
        &self,
        record: &mut TxRecord,
        postings: &[Posting],
    ) -> Result<Vec<TransactionEntry>> {
        let transaction_id = record.tx.id;
        let tx_type = record.tx.tx_type;
        if record.tx.status.is_terminal() {
            return Err(TripfinError::TransactionTerminal {
                id: transaction_id,
                status: record.tx.status,
            });
        }
        Self::check_shape(tx_type, postings)?;
        let currencies = if tx_type.is_external() {
            self.currencies(postings)?
        } else {
            HashMap::new()
        };

        let mut attempt = 0;
        let entries = loop {
            match self.ledger.post_batch(transaction_id, postings) {
                Err(err) if err.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(
                        tx = %transaction_id,
                        attempt,
                        error = %err,
                        "Lock contention, retrying postings"
                    );
                }
                other => break other?,
            }
        };

        record.entries.extend(entries.iter().cloned());
        if tx_type.is_external() {
            self.record_external_flow(tx_type, &currencies, &entries);
        }
        Ok(entries)
    }

    fn complete_locked(&self, record: &mut TxRecord) -> TransactionStatus {
        let transaction_id = record.tx.id;
        if record
            .tx
            .finish(TransactionStatus::Completed, self.clock.now(), None)
        {
            record.tx.receipt_digest = Some(receipt::entries_digest(transaction_id, &record.entries));
            tracing::info!(
                tx = %transaction_id,
                tx_type = %record.tx.tx_type,
                entries = record.entries.len(),
                "Transaction completed"
            );
        } else {
            tracing::debug!(tx = %transaction_id, status = %record.tx.status, "Complete on terminal transaction ignored");
        }
        record.tx.status
    }

    fn fail_locked(&self, record: &mut TxRecord, reason: &str) -> Result<TransactionStatus> {
        let transaction_id = record.tx.id;
        if record.tx.status == TransactionStatus::Pending && !record.entries.is_empty() {
            return Err(TripfinError::InvalidTransition {
                from: format!("{} with {} entries", record.tx.status, record.entries.len()),
                to: TransactionStatus::Failed.to_string(),
            });
        }
        if record.tx.finish(
            TransactionStatus::Failed,
            self.clock.now(),
            Some(reason.to_string()),
        ) {
            tracing::warn!(tx = %transaction_id, tx_type = %record.tx.tx_type, reason, "Transaction failed");
        }
        Ok(record.tx.status)
    }

    fn check_shape(tx_type: TransactionType, postings: &[Posting]) -> Result<()> {
        if postings.is_empty() {
            return Err(TripfinError::validation("no postings supplied"));
        }
        let required = match tx_type {
            TransactionType::Deposit => Some(EntryType::Credit),
            TransactionType::Withdrawal => Some(EntryType::Debit),
            _ => None,
        };
        match required {
            Some(kind) if postings.iter().any(|p| p.entry_type != kind) => Err(
                TripfinError::validation(format!("{tx_type} postings must all be {kind}")),
            ),
            Some(_) => Ok(()),
            None => ensure_balanced(postings),
        }
    }

    fn currencies(&self, postings: &[Posting]) -> Result<HashMap<WalletId, String>> {
        let mut currencies = HashMap::new();
        for posting in postings {
            if !currencies.contains_key(&posting.wallet_id) {
                let currency = self.ledger.wallet(posting.wallet_id)?.currency_code;
                currencies.insert(posting.wallet_id, currency);
            }
        }
        Ok(currencies)
    }

    fn record_external_flow(
        &self,
        tx_type: TransactionType,
        currencies: &HashMap<WalletId, String>,
        entries: &[TransactionEntry],
    ) {
        let mut supply = self.supply.lock();
        for entry in entries {
            let Some(currency) = currencies.get(&entry.wallet_id) else {
                continue;
            };
            match tx_type {
                TransactionType::Deposit => supply.record_deposit(currency, entry.amount),
                TransactionType::Withdrawal => supply.record_withdrawal(currency, entry.amount),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tripfin_types::{SystemClock, UserId, WalletOptions};

    struct Fixture {
        coord: TransactionCoordinator,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(&EngineConfig::default())
        }

        fn with_config(config: &EngineConfig) -> Self {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let ledger = Arc::new(LedgerStore::new(config, Arc::clone(&clock)));
            Self {
                coord: TransactionCoordinator::new(ledger, config, clock),
            }
        }

        fn wallet(&self) -> WalletId {
            self.coord
                .ledger()
                .open_wallet(UserId::new(), "INR", WalletOptions::default())
                .unwrap()
                .id
        }

        fn funded(&self, amount: i64) -> WalletId {
            let w = self.wallet();
            self.coord.deposit(w, dec(amount), json!({})).unwrap();
            w
        }

        fn balance(&self, w: WalletId) -> Decimal {
            self.coord.ledger().balance(w).unwrap()
        }
    }

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn contended(lock_timeout_ms: u64, max_conflict_retries: u32) -> EngineConfig {
        EngineConfig {
            lock_timeout_ms,
            max_conflict_retries,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn open_is_pending() {
        let f = Fixture::new();
        let tx = f.coord.open(TransactionType::Financing, json!({"trip": "t1"}));
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(f.coord.get(tx.id).unwrap().metadata["trip"], "t1");
    }

    #[test]
    fn balanced_multi_posting() {
        let f = Fixture::new();
        let lender = f.funded(500_000);
        let transporter = f.wallet();
        let platform = f.wallet();

        let tx = f.coord.open(TransactionType::Financing, json!({}));
        let entries = f
            .coord
            .post_multi(
                tx.id,
                &[
                    Posting::debit(lender, dec(100_000)),
                    Posting::credit(transporter, dec(98_000)),
                    Posting::credit(platform, dec(2_000)),
                ],
            )
            .unwrap();
        assert_eq!(entries.len(), 3);
        let net: Decimal = entries.iter().map(TransactionEntry::signed_amount).sum();
        assert_eq!(net, Decimal::ZERO);

        assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Completed);
        assert_eq!(f.balance(lender), dec(400_000));
        assert_eq!(f.balance(transporter), dec(98_000));
        assert_eq!(f.balance(platform), dec(2_000));
        assert!(f.coord.get(tx.id).unwrap().receipt_digest.is_some());
        f.coord.verify_supply("INR").unwrap();
    }

    #[test]
    fn unbalanced_postings_rejected() {
        let f = Fixture::new();
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));
        let err = f
            .coord
            .post_multi(tx.id, &[Posting::debit(a, dec(50)), Posting::credit(b, dec(40))])
            .unwrap_err();
        assert!(matches!(err, TripfinError::UnbalancedPostings { .. }));
        assert_eq!(f.balance(a), dec(100));
    }

    #[test]
    fn deposit_must_be_credit_only() {
        let f = Fixture::new();
        let a = f.wallet();
        let tx = f.coord.open(TransactionType::Deposit, json!({}));
        let err = f
            .coord
            .post_multi(tx.id, &[Posting::debit(a, dec(1))])
            .unwrap_err();
        assert!(matches!(err, TripfinError::Validation { .. }));
    }

    #[test]
    fn terminal_transitions_are_idempotent() {
        let f = Fixture::new();
        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));
        assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Completed);
        assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Completed);
        assert_eq!(f.coord.fail(tx.id, "late").unwrap(), TransactionStatus::Completed);
        assert_eq!(f.coord.get(tx.id).unwrap().failure_reason, None);

        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));
        assert_eq!(f.coord.fail(tx.id, "boom").unwrap(), TransactionStatus::Failed);
        assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Failed);
        assert_eq!(f.coord.get(tx.id).unwrap().failure_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn terminal_transaction_rejects_postings() {
        let f = Fixture::new();
        let a = f.wallet();
        let tx = f.coord.open(TransactionType::Deposit, json!({}));
        f.coord.fail(tx.id, "abandoned").unwrap();
        let err = f
            .coord
            .post_multi(tx.id, &[Posting::credit(a, dec(1))])
            .unwrap_err();
        assert!(matches!(err, TripfinError::TransactionTerminal { .. }));
    }

    #[test]
    fn failed_transfer_appends_nothing() {
        let f = Fixture::new();
        let a = f.funded(100);
        let b = f.wallet();
        let err = f.coord.transfer(a, b, dec(150), json!({})).unwrap_err();
        assert!(matches!(err, TripfinError::InsufficientFunds { .. }));
        assert_eq!(f.balance(a), dec(100));
        assert_eq!(f.balance(b), Decimal::ZERO);
        assert_eq!(f.coord.ledger().entries(b).unwrap().len(), 0);
        assert_eq!(f.coord.ledger().entries(a).unwrap().len(), 1);
    }

    #[test]
    fn transfer_completes() {
        let f = Fixture::new();
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.transfer(a, b, dec(60), json!({"note": "refund"})).unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.tx_type, TransactionType::ManualTransfer);
        assert_eq!(f.balance(a), dec(40));
        assert_eq!(f.balance(b), dec(60));
        f.coord.verify_supply("INR").unwrap();
    }

    #[test]
    fn withdrawal_reduces_supply() {
        let f = Fixture::new();
        let a = f.funded(1_000);
        f.coord.withdraw(a, dec(300), json!({})).unwrap();
        assert_eq!(f.balance(a), dec(700));
        f.coord.verify_supply("INR").unwrap();
    }

    #[test]
    fn unknown_transaction() {
        let f = Fixture::new();
        let err = f.coord.complete(TransactionId::new()).unwrap_err();
        assert!(matches!(err, TripfinError::TransactionNotFound(_)));
    }

    #[test]
    fn posted_transaction_cannot_fail() {
        let f = Fixture::new();
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));
        f.coord
            .post_multi(tx.id, &[Posting::debit(a, dec(30)), Posting::credit(b, dec(30))])
            .unwrap();

        let err = f.coord.fail(tx.id, "caller gave up").unwrap_err();
        assert!(matches!(err, TripfinError::InvalidTransition { .. }));
        assert_eq!(f.coord.get(tx.id).unwrap().status, TransactionStatus::Pending);
        assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Completed);
        assert_eq!(f.coord.entries(tx.id).unwrap().len(), 2);
    }

    #[test]
    fn completion_ignores_unrelated_wallet_locks() {
        let f = Fixture::with_config(&contended(20, 0));
        let a = f.funded(100);
        let b = f.wallet();
        let bystander = f.wallet();

        let tx = f
            .coord
            .ledger()
            .with_book_held(bystander, || f.coord.transfer(a, b, dec(60), json!({})))
            .unwrap()
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.receipt_digest.is_some());
        assert_eq!(f.coord.entries(tx.id).unwrap().len(), 2);
        assert_eq!(f.balance(a), dec(40));
        assert_eq!(f.balance(b), dec(60));
    }

    #[test]
    fn receipt_matches_posted_entries() {
        let f = Fixture::new();
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.transfer(a, b, dec(25), json!({})).unwrap();
        let from_ledger = f.coord.ledger().entries_for_transaction(tx.id).unwrap();
        assert_eq!(
            tx.receipt_digest.as_deref(),
            Some(receipt::entries_digest(tx.id, &from_ledger).as_str())
        );
    }

    #[test]
    fn conflict_retries_are_bounded() {
        let f = Fixture::with_config(&contended(20, 2));
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));

        let started = std::time::Instant::now();
        let err = f
            .coord
            .ledger()
            .with_book_held(a, || {
                f.coord
                    .post_multi(tx.id, &[Posting::debit(a, dec(60)), Posting::credit(b, dec(60))])
            })
            .unwrap()
            .unwrap_err();
        // First attempt plus two retries, each waiting out the lock timeout.
        assert!(started.elapsed() >= std::time::Duration::from_millis(60));
        assert!(err.is_retryable());

        assert!(f.coord.entries(tx.id).unwrap().is_empty());
        assert_eq!(f.coord.fail(tx.id, "contended").unwrap(), TransactionStatus::Failed);
        assert_eq!(f.balance(a), dec(100));
        assert!(f.coord.ledger().entries(b).unwrap().is_empty());
    }

    #[test]
    fn conflicted_execute_is_safe_to_retry() {
        let f = Fixture::with_config(&contended(20, 1));
        let a = f.funded(100);
        let b = f.wallet();

        let err = f
            .coord
            .ledger()
            .with_book_held(b, || f.coord.transfer(a, b, dec(60), json!({})))
            .unwrap()
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(f.balance(a), dec(100));

        f.coord.transfer(a, b, dec(60), json!({})).unwrap();
        assert_eq!(f.balance(a), dec(40));
        assert_eq!(f.balance(b), dec(60));
        f.coord.verify_supply("INR").unwrap();
    }

    #[test]
    fn retry_recovers_once_contention_clears() {
        let f = Fixture::with_config(&contended(40, 5));
        let a = f.funded(100);
        let b = f.wallet();
        let ledger = f.coord.ledger();
        let (held_tx, held_rx) = std::sync::mpsc::channel();

        let tx = std::thread::scope(|scope| {
            scope.spawn(move || {
                ledger
                    .with_book_held(a, || {
                        held_tx.send(()).unwrap();
                        std::thread::sleep(std::time::Duration::from_millis(60));
                    })
                    .unwrap();
            });
            held_rx.recv().unwrap();
            f.coord.transfer(a, b, dec(60), json!({})).unwrap()
        });

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(f.coord.entries(tx.id).unwrap().len(), 2);
        assert_eq!(f.balance(a), dec(40));
        assert_eq!(f.balance(b), dec(60));
    }

    #[test]
    fn fail_racing_post_never_strands_entries() {
        let f = Fixture::with_config(&contended(300, 0));
        let a = f.funded(100);
        let b = f.wallet();
        let tx = f.coord.open(TransactionType::ManualTransfer, json!({}));
        let ledger = f.coord.ledger();
        let coord = &f.coord;
        let (held_tx, held_rx) = std::sync::mpsc::channel();

        let (posted, failed) = std::thread::scope(|scope| {
            scope.spawn(move || {
                ledger
                    .with_book_held(a, || {
                        held_tx.send(()).unwrap();
                        std::thread::sleep(std::time::Duration::from_millis(80));
                    })
                    .unwrap();
            });
            held_rx.recv().unwrap();
            let poster = scope.spawn(move || {
                coord.post_multi(tx.id, &[Posting::debit(a, dec(60)), Posting::credit(b, dec(60))])
            });
            let failer = scope.spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(20));
                coord.fail(tx.id, "caller gave up")
            });
            (poster.join().unwrap(), failer.join().unwrap())
        });

        let status = f.coord.get(tx.id).unwrap().status;
        let entries = f.coord.entries(tx.id).unwrap();
        if status == TransactionStatus::Failed {
            assert!(matches!(posted, Err(TripfinError::TransactionTerminal { .. })));
            assert!(entries.is_empty());
            assert_eq!(f.balance(a), dec(100));
        } else {
            assert!(posted.is_ok());
            assert!(matches!(failed, Err(TripfinError::InvalidTransition { .. })));
            assert_eq!(entries.len(), 2);
            assert_eq!(f.coord.complete(tx.id).unwrap(), TransactionStatus::Completed);
            assert_eq!(f.balance(a), dec(40));
        }
    }
}

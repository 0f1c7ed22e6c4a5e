//! Append-only ledger store.
//!
//! Each wallet owns a book of [`TransactionEntry`] records behind its own
//! lock. Entries are only ever appended; the newest entry's
//! `balance_after` is the wallet's balance, so reading a balance never
//! scans history. [`LedgerStore::verify_wallet`] is the slow path that
//! re-sums everything.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use parking_lot::{Mutex, MutexGuard, RwLock};
use rust_decimal::Decimal;
use tripfin_types::{
    money, AuditFields, Clock, EngineConfig, EntryId, EntryType, Posting, Result,
    TransactionEntry, TransactionId, TripfinError, UserId, Wallet, WalletId, WalletOptions,
    WalletStatus,
};

/// Entry history of one wallet.
#[derive(Debug, Default)]
struct WalletBook {
    entries: Vec<TransactionEntry>,
    /// Last sequence number used per transaction.
    sequences: HashMap<TransactionId, u32>,
}

impl WalletBook {
    fn balance(&self) -> Decimal {
        self.entries
            .last()
            .map_or(Decimal::ZERO, |e| e.balance_after)
    }

    fn next_sequence(&self, tx_id: TransactionId) -> u32 {
        self.sequences.get(&tx_id).copied().unwrap_or(0) + 1
    }
}

#[derive(Debug)]
struct WalletSlot {
    wallet: RwLock<Wallet>,
    book: Mutex<WalletBook>,
}

/// The single source of truth for wallet balances.
pub struct LedgerStore {
    wallets: RwLock<HashMap<WalletId, Arc<WalletSlot>>>,
    by_user: RwLock<HashMap<UserId, WalletId>>,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl LedgerStore {
    #[must_use]
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
            lock_timeout: config.lock_timeout(),
            clock,
        }
    }

    // -----------------------------------------------------------------
    // Wallet provisioning
    // -----------------------------------------------------------------

    /// Provision the wallet for `user_id`. A user gets at most one.
    ///
    /// # Errors
    /// Returns [`TripfinError::DuplicateWallet`] if the user already has one.
    pub fn open_wallet(
        &self,
        user_id: UserId,
        currency_code: &str,
        options: WalletOptions,
    ) -> Result<Wallet> {
        if currency_code.trim().is_empty() {
            return Err(TripfinError::validation("currency code must not be empty"));
        }

        let mut by_user = self.by_user.write();
        if by_user.contains_key(&user_id) {
            return Err(TripfinError::DuplicateWallet(user_id));
        }

        let wallet = Wallet {
            id: WalletId::new(),
            user_id,
            currency_code: currency_code.to_string(),
            status: WalletStatus::Active,
            overdraft: options.overdraft,
            audit: AuditFields::new(self.clock.now()),
        };
        let slot = Arc::new(WalletSlot {
            wallet: RwLock::new(wallet.clone()),
            book: Mutex::new(WalletBook::default()),
        });
        self.wallets.write().insert(wallet.id, slot);
        by_user.insert(user_id, wallet.id);

        tracing::info!(
            wallet = %wallet.id,
            user = %user_id,
            currency = %wallet.currency_code,
            overdraft = wallet.overdraft,
            "Wallet opened"
        );
        Ok(wallet)
    }

    /// Suspend, close, or reactivate a wallet. Serialized with postings.
    pub fn set_wallet_status(&self, wallet_id: WalletId, status: WalletStatus) -> Result<Wallet> {
        let slot = self.slot(wallet_id)?;
        let _book = self.lock_book(wallet_id, &slot)?;
        let mut wallet = slot.wallet.write();
        wallet.status = status;
        wallet.audit.touch(self.clock.now());
        tracing::info!(wallet = %wallet_id, %status, "Wallet status changed");
        Ok(wallet.clone())
    }

    pub fn wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        Ok(self.slot(wallet_id)?.wallet.read().clone())
    }

    /// Look up a user's wallet by index.
    ///
    /// # Errors
    /// Returns [`TripfinError::WalletNotProvisioned`]; wallets are never
    /// created implicitly.
    pub fn wallet_for_user(&self, user_id: UserId) -> Result<Wallet> {
        let wallet_id = self
            .by_user
            .read()
            .get(&user_id)
            .copied()
            .ok_or(TripfinError::WalletNotProvisioned(user_id))?;
        self.wallet(wallet_id)
    }

    // -----------------------------------------------------------------
    // Postings
    // -----------------------------------------------------------------

    /// Append one entry to one wallet.
    pub fn post_entry(
        &self,
        wallet_id: WalletId,
        transaction_id: TransactionId,
        entry_type: EntryType,
        amount: Decimal,
    ) -> Result<TransactionEntry> {
        let posting = Posting {
            wallet_id,
            entry_type,
            amount,
        };
        self.post_batch(transaction_id, &[posting])?
            .into_iter()
            .next()
            .ok_or_else(|| TripfinError::Internal("posting produced no entry".into()))
    }

    /// Append a group of entries all-or-nothing.
    ///
    /// 1. Sort postings by wallet ID (stable, so same-wallet postings keep
    ///    caller order)
    /// 2. Lock every distinct wallet in ascending ID order
    /// 3. Stage every new balance; any failure here leaves no trace
    /// 4. Append all entries
    ///
    /// # Errors
    /// - `Validation` for non-positive or over-precise amounts
    /// - `WalletNotFound` / `WalletNotActive`
    /// - `InsufficientFunds` if a DEBIT would take a non-overdraft wallet negative
    /// - `ConcurrencyConflict` if a wallet lock isn't acquired within the timeout
    pub fn post_batch(
        &self,
        transaction_id: TransactionId,
        postings: &[Posting],
    ) -> Result<Vec<TransactionEntry>> {
        if postings.is_empty() {
            return Err(TripfinError::validation("no postings supplied"));
        }
        for posting in postings {
            money::validate_amount(posting.amount)?;
        }

        let mut ordered = postings.to_vec();
        ordered.sort_by_key(|p| p.wallet_id);

        let mut slots: Vec<(WalletId, Arc<WalletSlot>)> = Vec::new();
        for posting in &ordered {
            if slots.last().is_none_or(|(id, _)| *id != posting.wallet_id) {
                slots.push((posting.wallet_id, self.slot(posting.wallet_id)?));
            }
        }

        // Ascending acquisition; guards drop together at the end of scope.
        let mut books: BTreeMap<WalletId, MutexGuard<'_, WalletBook>> = BTreeMap::new();
        let mut wallets: HashMap<WalletId, Wallet> = HashMap::new();
        for (wallet_id, slot) in &slots {
            let book = self.lock_book(*wallet_id, slot)?;
            let wallet = slot.wallet.read().clone();
            if !wallet.status.accepts_postings() {
                return Err(TripfinError::WalletNotActive {
                    wallet: *wallet_id,
                    status: wallet.status,
                });
            }
            books.insert(*wallet_id, book);
            wallets.insert(*wallet_id, wallet);
        }

        // Stage.
        let now = self.clock.now();
        let mut running: HashMap<WalletId, (Decimal, u32)> = books
            .iter()
            .map(|(id, book)| (*id, (book.balance(), book.next_sequence(transaction_id))))
            .collect();
        let mut staged = Vec::with_capacity(ordered.len());
        for posting in &ordered {
            let wallet = &wallets[&posting.wallet_id];
            let (balance, sequence) = running
                .get_mut(&posting.wallet_id)
                .ok_or_else(|| TripfinError::Internal("wallet lock missing".into()))?;

            let after = posting.entry_type.apply(*balance, posting.amount);
            if posting.entry_type == EntryType::Debit && after < Decimal::ZERO && !wallet.overdraft
            {
                tracing::warn!(
                    wallet = %posting.wallet_id,
                    tx = %transaction_id,
                    needed = %posting.amount,
                    available = %balance,
                    "Debit rejected: insufficient funds"
                );
                return Err(TripfinError::InsufficientFunds {
                    wallet: posting.wallet_id,
                    needed: posting.amount,
                    available: *balance,
                });
            }

            staged.push(TransactionEntry {
                id: EntryId::new(),
                transaction_id,
                wallet_id: posting.wallet_id,
                entry_type: posting.entry_type,
                amount: posting.amount,
                balance_after: after,
                entry_sequence: *sequence,
                created_at: now,
            });
            *balance = after;
            *sequence += 1;
        }

        // Commit.
        for entry in &staged {
            let book = books
                .get_mut(&entry.wallet_id)
                .ok_or_else(|| TripfinError::Internal("wallet lock missing".into()))?;
            book.sequences
                .insert(transaction_id, entry.entry_sequence);
            book.entries.push(entry.clone());
            tracing::debug!(
                wallet = %entry.wallet_id,
                tx = %transaction_id,
                entry_type = %entry.entry_type,
                amount = %entry.amount,
                balance_after = %entry.balance_after,
                seq = entry.entry_sequence,
                "Entry posted"
            );
        }

        Ok(staged)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    /// Current balance: the newest entry's snapshot, or zero.
    pub fn balance(&self, wallet_id: WalletId) -> Result<Decimal> {
        let slot = self.slot(wallet_id)?;
        let book = self.lock_book(wallet_id, &slot)?;
        Ok(book.balance())
    }

    /// Full entry history of a wallet, oldest first.
    pub fn entries(&self, wallet_id: WalletId) -> Result<Vec<TransactionEntry>> {
        let slot = self.slot(wallet_id)?;
        let book = self.lock_book(wallet_id, &slot)?;
        Ok(book.entries.clone())
    }

    /// Every entry belonging to a transaction, ordered by wallet then sequence.
    pub fn entries_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<TransactionEntry>> {
        let mut slots: Vec<(WalletId, Arc<WalletSlot>)> = self
            .wallets
            .read()
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();
        slots.sort_by_key(|(id, _)| *id);

        let mut found = Vec::new();
        for (wallet_id, slot) in &slots {
            let book = self.lock_book(*wallet_id, slot)?;
            found.extend(
                book.entries
                    .iter()
                    .filter(|e| e.transaction_id == transaction_id)
                    .cloned(),
            );
        }
        Ok(found)
    }

    /// Re-derive the balance from the full history and check it against the
    /// cached snapshots, entry by entry.
    ///
    /// # Errors
    /// Returns [`TripfinError::LedgerInvariantViolation`] on any mismatch.
    pub fn verify_wallet(&self, wallet_id: WalletId) -> Result<Decimal> {
        let slot = self.slot(wallet_id)?;
        let book = self.lock_book(wallet_id, &slot)?;

        let mut running = Decimal::ZERO;
        for entry in &book.entries {
            running += entry.signed_amount();
            if running != entry.balance_after {
                return Err(TripfinError::LedgerInvariantViolation {
                    reason: format!(
                        "{wallet_id}: entry {} snapshot {} but history sums to {running}",
                        entry.id, entry.balance_after
                    ),
                });
            }
        }
        Ok(running)
    }

    /// Σ balances over every wallet in `currency_code`.
    pub fn total_balance(&self, currency_code: &str) -> Result<Decimal> {
        let slots: Vec<(WalletId, Arc<WalletSlot>)> = self
            .wallets
            .read()
            .iter()
            .filter(|(_, slot)| slot.wallet.read().currency_code == currency_code)
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut total = Decimal::ZERO;
        for (wallet_id, slot) in &slots {
            total += self.lock_book(*wallet_id, slot)?.balance();
        }
        Ok(total)
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.read().len()
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn slot(&self, wallet_id: WalletId) -> Result<Arc<WalletSlot>> {
        self.wallets
            .read()
            .get(&wallet_id)
            .cloned()
            .ok_or(TripfinError::WalletNotFound(wallet_id))
    }

    fn lock_book<'a>(
        &self,
        wallet_id: WalletId,
        slot: &'a WalletSlot,
    ) -> Result<MutexGuard<'a, WalletBook>> {
        slot.book
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| TripfinError::conflict(wallet_id))
    }

    /// Run `f` while holding `wallet_id`'s book lock.
    #[cfg(test)]
    pub(crate) fn with_book_held<R>(&self, wallet_id: WalletId, f: impl FnOnce() -> R) -> Result<R> {
        let slot = self.slot(wallet_id)?;
        let _book = slot.book.lock();
        Ok(f())
    }
}

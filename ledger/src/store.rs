//! Account store with per-account atomic balance primitives.

use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};

use escrowcore_common::{Credits, EscrowError, Result, TransactionId, UserId};

use crate::account::Account;
use crate::balance::AccountBalance;
use crate::journal::{Journal, JournalEntry, JournalKind};

/// Storage of per-user balances.
///
/// Every mutation runs inside the target account's mutex and appends its
/// journal entry before the lock is dropped, so no interleaving can produce
/// a lost update or a journal snapshot that disagrees with the balance.
/// Transfers touching two accounts take both locks, in canonical id order.
pub struct AccountStore {
    /// Accounts by user, each behind its own mutex.
    accounts: DashMap<UserId, Arc<Mutex<Account>>>,
    /// Audit journal, appended under the account lock.
    journal: Arc<Journal>,
}

impl AccountStore {
    /// Create an empty store with its own journal.
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            journal: Arc::new(Journal::new()),
        }
    }

    /// The audit journal fed by this store.
    pub fn journal(&self) -> &Arc<Journal> {
        &self.journal
    }

    /// Create the account if it does not exist. Returns true if created.
    pub fn ensure_account(&self, user_id: &UserId) -> bool {
        match self.accounts.entry(user_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Mutex::new(Account::new(user_id.clone()))));
                info!(user = %user_id, "Account created");
                true
            }
        }
    }

    /// Check if an account exists.
    pub fn exists(&self, user_id: &UserId) -> bool {
        self.accounts.contains_key(user_id)
    }

    /// Number of accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    fn handle(&self, user_id: &UserId) -> Result<Arc<Mutex<Account>>> {
        self.accounts
            .get(user_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EscrowError::AccountNotFound(user_id.clone()))
    }

    /// Move `amount` from available to escrow.
    ///
    /// The escrow hold at commit. Fails without touching the account if the
    /// available balance is short.
    pub fn debit_available(
        &self,
        user_id: &UserId,
        amount: Credits,
        transaction_id: TransactionId,
    ) -> Result<AccountBalance> {
        if amount.is_zero() {
            return Err(EscrowError::InvalidAmount);
        }

        let handle = self.handle(user_id)?;
        let mut account = handle.lock();

        let new_available =
            account
                .available
                .checked_sub(amount)
                .ok_or(EscrowError::InsufficientFunds {
                    required: amount,
                    available: account.available,
                })?;
        let new_escrow = account
            .escrow
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow)?;

        account.available = new_available;
        account.escrow = new_escrow;
        account.updated_at = Utc::now();

        self.journal.append(JournalEntry::new(
            Some(transaction_id),
            user_id.clone(),
            JournalKind::Hold,
            amount,
            account.available,
            account.escrow,
        ));

        debug!(
            user = %user_id,
            amount = %amount,
            transaction_id = %transaction_id,
            "Escrow hold placed"
        );

        Ok(account.snapshot())
    }

    /// Increase the available balance.
    ///
    /// `kind` records why in the journal: `Deposit` for funding from outside
    /// the ledger, `Payout` when called on behalf of an escrow release.
    pub fn credit_available(
        &self,
        user_id: &UserId,
        amount: Credits,
        transaction_id: Option<TransactionId>,
        kind: JournalKind,
    ) -> Result<AccountBalance> {
        if amount.is_zero() {
            return Err(EscrowError::InvalidAmount);
        }

        let handle = self.handle(user_id)?;
        let mut account = handle.lock();

        account.available = account
            .available
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow)?;
        account.updated_at = Utc::now();

        self.journal.append(JournalEntry::new(
            transaction_id,
            user_id.clone(),
            kind,
            amount,
            account.available,
            account.escrow,
        ));

        debug!(user = %user_id, amount = %amount, ?kind, "Available balance credited");

        Ok(account.snapshot())
    }

    /// Release `amount` from `source`'s escrow into `dest`'s available
    /// balance as one atomic unit.
    ///
    /// `source == dest` is the refund path (escrow returned to the buyer).
    /// For distinct accounts both mutexes are held across the check and the
    /// mutation; lock order is canonical by user id, so two opposing
    /// transfers cannot deadlock. Either both balances move or neither does.
    pub fn release_escrow_to(
        &self,
        source: &UserId,
        dest: &UserId,
        amount: Credits,
        transaction_id: TransactionId,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(EscrowError::InvalidAmount);
        }

        let source_handle = self.handle(source)?;

        if source == dest {
            let mut account = source_handle.lock();

            let new_escrow =
                account
                    .escrow
                    .checked_sub(amount)
                    .ok_or(EscrowError::EscrowUnderflow {
                        required: amount,
                        held: account.escrow,
                    })?;
            let new_available = account
                .available
                .checked_add(amount)
                .ok_or(EscrowError::BalanceOverflow)?;

            account.escrow = new_escrow;
            account.available = new_available;
            account.updated_at = Utc::now();

            self.journal.append(JournalEntry::new(
                Some(transaction_id),
                source.clone(),
                JournalKind::Refund,
                amount,
                account.available,
                account.escrow,
            ));

            debug!(
                user = %source,
                amount = %amount,
                transaction_id = %transaction_id,
                "Escrow refunded"
            );
            return Ok(());
        }

        let dest_handle = self.handle(dest)?;

        let (mut source_account, mut dest_account);
        if source < dest {
            source_account = source_handle.lock();
            dest_account = dest_handle.lock();
        } else {
            dest_account = dest_handle.lock();
            source_account = source_handle.lock();
        }

        // Validate both sides before mutating either
        let new_source_escrow =
            source_account
                .escrow
                .checked_sub(amount)
                .ok_or(EscrowError::EscrowUnderflow {
                    required: amount,
                    held: source_account.escrow,
                })?;
        let new_dest_available = dest_account
            .available
            .checked_add(amount)
            .ok_or(EscrowError::BalanceOverflow)?;

        let now = Utc::now();
        source_account.escrow = new_source_escrow;
        source_account.updated_at = now;
        dest_account.available = new_dest_available;
        dest_account.updated_at = now;

        self.journal.append(JournalEntry::new(
            Some(transaction_id),
            source.clone(),
            JournalKind::Release,
            amount,
            source_account.available,
            source_account.escrow,
        ));
        self.journal.append(JournalEntry::new(
            Some(transaction_id),
            dest.clone(),
            JournalKind::Payout,
            amount,
            dest_account.available,
            dest_account.escrow,
        ));

        debug!(
            source = %source,
            dest = %dest,
            amount = %amount,
            transaction_id = %transaction_id,
            "Escrow released to destination"
        );

        Ok(())
    }

    /// Point-in-time balance snapshot.
    pub fn balance(&self, user_id: &UserId) -> Result<AccountBalance> {
        let handle = self.handle(user_id)?;
        let account = handle.lock();
        Ok(account.snapshot())
    }

    /// Sum of every account's total wealth.
    ///
    /// Accounts are locked one at a time, so the sum is only meaningful at a
    /// quiet point (tests, end-of-run checks).
    pub fn total_credits(&self) -> Credits {
        self.accounts
            .iter()
            .map(|entry| entry.value().lock().total())
            .sum()
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded_store(user: &str, amount: u64) -> AccountStore {
        let store = AccountStore::new();
        let user = UserId::new(user);
        store.ensure_account(&user);
        store
            .credit_available(&user, Credits::new(amount), None, JournalKind::Deposit)
            .unwrap();
        store
    }

    #[test]
    fn test_ensure_account_is_idempotent() {
        let store = AccountStore::new();
        let alice = UserId::new("alice");

        assert!(store.ensure_account(&alice));
        assert!(!store.ensure_account(&alice));
        assert_eq!(store.account_count(), 1);
        assert_eq!(store.balance(&alice).unwrap().available, Credits::ZERO);
    }

    #[test]
    fn test_debit_moves_available_to_escrow() {
        let store = funded_store("alice", 500);
        let alice = UserId::new("alice");
        let txn = TransactionId::new();

        let balance = store
            .debit_available(&alice, Credits::new(200), txn)
            .unwrap();

        assert_eq!(balance.available, Credits::new(300));
        assert_eq!(balance.escrow, Credits::new(200));
        assert_eq!(balance.total(), Credits::new(500));
    }

    #[test]
    fn test_debit_insufficient_funds() {
        let store = funded_store("alice", 100);
        let alice = UserId::new("alice");

        let err = store
            .debit_available(&alice, Credits::new(101), TransactionId::new())
            .unwrap_err();

        match err {
            EscrowError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, Credits::new(101));
                assert_eq!(available, Credits::new(100));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing moved
        let balance = store.balance(&alice).unwrap();
        assert_eq!(balance.available, Credits::new(100));
        assert_eq!(balance.escrow, Credits::ZERO);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let store = funded_store("alice", 100);
        let alice = UserId::new("alice");

        assert!(matches!(
            store.debit_available(&alice, Credits::ZERO, TransactionId::new()),
            Err(EscrowError::InvalidAmount)
        ));
        assert!(matches!(
            store.credit_available(&alice, Credits::ZERO, None, JournalKind::Deposit),
            Err(EscrowError::InvalidAmount)
        ));
    }

    #[test]
    fn test_credit_overflow() {
        let store = funded_store("alice", u64::MAX);
        let alice = UserId::new("alice");

        assert!(matches!(
            store.credit_available(&alice, Credits::new(1), None, JournalKind::Deposit),
            Err(EscrowError::BalanceOverflow)
        ));
    }

    #[test]
    fn test_unknown_account() {
        let store = AccountStore::new();
        let ghost = UserId::new("ghost");

        assert!(matches!(
            store.balance(&ghost),
            Err(EscrowError::AccountNotFound(_))
        ));
        assert!(matches!(
            store.debit_available(&ghost, Credits::new(1), TransactionId::new()),
            Err(EscrowError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_release_escrow_to_provider() {
        let store = funded_store("buyer", 500);
        let buyer = UserId::new("buyer");
        let provider = UserId::new("provider");
        store.ensure_account(&provider);
        let txn = TransactionId::new();

        store.debit_available(&buyer, Credits::new(200), txn).unwrap();
        store
            .release_escrow_to(&buyer, &provider, Credits::new(200), txn)
            .unwrap();

        let buyer_balance = store.balance(&buyer).unwrap();
        assert_eq!(buyer_balance.available, Credits::new(300));
        assert_eq!(buyer_balance.escrow, Credits::ZERO);

        let provider_balance = store.balance(&provider).unwrap();
        assert_eq!(provider_balance.available, Credits::new(200));
        assert_eq!(provider_balance.escrow, Credits::ZERO);
    }

    #[test]
    fn test_release_underflow_leaves_both_untouched() {
        let store = funded_store("buyer", 500);
        let buyer = UserId::new("buyer");
        let provider = UserId::new("provider");
        store.ensure_account(&provider);
        let txn = TransactionId::new();

        store.debit_available(&buyer, Credits::new(100), txn).unwrap();

        let err = store
            .release_escrow_to(&buyer, &provider, Credits::new(200), txn)
            .unwrap_err();
        match err {
            EscrowError::EscrowUnderflow { required, held } => {
                assert_eq!(required, Credits::new(200));
                assert_eq!(held, Credits::new(100));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.balance(&buyer).unwrap().escrow, Credits::new(100));
        assert_eq!(store.balance(&provider).unwrap().available, Credits::ZERO);
    }

    #[test]
    fn test_refund_same_account() {
        let store = funded_store("buyer", 500);
        let buyer = UserId::new("buyer");
        let txn = TransactionId::new();

        store.debit_available(&buyer, Credits::new(200), txn).unwrap();
        store
            .release_escrow_to(&buyer, &buyer, Credits::new(200), txn)
            .unwrap();

        let balance = store.balance(&buyer).unwrap();
        assert_eq!(balance.available, Credits::new(500));
        assert_eq!(balance.escrow, Credits::ZERO);
    }

    #[test]
    fn test_journal_records_exact_after_balances() {
        let store = funded_store("buyer", 500);
        let buyer = UserId::new("buyer");
        let provider = UserId::new("provider");
        store.ensure_account(&provider);
        let txn = TransactionId::new();

        store.debit_available(&buyer, Credits::new(200), txn).unwrap();
        store
            .release_escrow_to(&buyer, &provider, Credits::new(200), txn)
            .unwrap();

        let entries = store.journal().entries_for_transaction(txn);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].kind, JournalKind::Hold);
        assert_eq!(entries[0].available_after, Credits::new(300));
        assert_eq!(entries[0].escrow_after, Credits::new(200));

        assert_eq!(entries[1].kind, JournalKind::Release);
        assert_eq!(entries[1].escrow_after, Credits::ZERO);

        assert_eq!(entries[2].kind, JournalKind::Payout);
        assert_eq!(entries[2].user_id, provider);
        assert_eq!(entries[2].available_after, Credits::new(200));
    }

    #[test]
    fn test_concurrent_debits_exactly_one_wins() {
        let store = Arc::new(funded_store("buyer", 100));
        let buyer = UserId::new("buyer");
        let barrier = Arc::new(std::sync::Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let buyer = buyer.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.debit_available(&buyer, Credits::new(60), TransactionId::new())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let shortfalls = results
            .iter()
            .filter(|r| matches!(r, Err(EscrowError::InsufficientFunds { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(shortfalls, 1);

        let balance = store.balance(&buyer).unwrap();
        assert_eq!(balance.available, Credits::new(40));
        assert_eq!(balance.escrow, Credits::new(60));
    }

    #[test]
    fn test_total_credits_conserved_across_transfer() {
        let store = funded_store("buyer", 500);
        let buyer = UserId::new("buyer");
        let provider = UserId::new("provider");
        store.ensure_account(&provider);
        let txn = TransactionId::new();

        assert_eq!(store.total_credits(), Credits::new(500));
        store.debit_available(&buyer, Credits::new(200), txn).unwrap();
        assert_eq!(store.total_credits(), Credits::new(500));
        store
            .release_escrow_to(&buyer, &provider, Credits::new(200), txn)
            .unwrap();
        assert_eq!(store.total_credits(), Credits::new(500));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Deposit { user: usize, amount: u64 },
            Hold { user: usize, amount: u64 },
            Release { source: usize, dest: usize, amount: u64 },
            Refund { user: usize, amount: u64 },
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..3usize, 1..1_000u64).prop_map(|(user, amount)| Op::Deposit { user, amount }),
                (0..3usize, 1..1_000u64).prop_map(|(user, amount)| Op::Hold { user, amount }),
                (0..3usize, 0..3usize, 1..1_000u64)
                    .prop_map(|(source, dest, amount)| Op::Release {
                        source,
                        dest,
                        amount
                    }),
                (0..3usize, 1..1_000u64).prop_map(|(user, amount)| Op::Refund { user, amount }),
            ]
        }

        proptest! {
            /// Whatever sequence of primitives runs, credits are conserved:
            /// the store's total equals the sum of successful deposits, and
            /// no balance can go negative (unsigned by construction).
            #[test]
            fn credits_conserved_over_any_sequence(ops in prop::collection::vec(op_strategy(), 1..60)) {
                let store = AccountStore::new();
                let users: Vec<UserId> = (0..3)
                    .map(|i| UserId::new(format!("user_{i}")))
                    .collect();
                for user in &users {
                    store.ensure_account(user);
                }

                for op in ops {
                    match op {
                        Op::Deposit { user, amount } => {
                            let _ = store.credit_available(
                                &users[user],
                                Credits::new(amount),
                                None,
                                JournalKind::Deposit,
                            );
                        }
                        Op::Hold { user, amount } => {
                            let _ = store.debit_available(
                                &users[user],
                                Credits::new(amount),
                                TransactionId::new(),
                            );
                        }
                        Op::Release { source, dest, amount } => {
                            let _ = store.release_escrow_to(
                                &users[source],
                                &users[dest],
                                Credits::new(amount),
                                TransactionId::new(),
                            );
                        }
                        Op::Refund { user, amount } => {
                            let _ = store.release_escrow_to(
                                &users[user],
                                &users[user],
                                Credits::new(amount),
                                TransactionId::new(),
                            );
                        }
                    }
                }

                prop_assert_eq!(store.total_credits(), store.journal().total_deposited());
            }
        }
    }
}

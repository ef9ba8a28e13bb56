//! Append-only audit journal for balance mutations.

use chrono::{DateTime, Utc};
use escrowcore_common::{Credits, JournalEntryId, TransactionId, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Why a balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    /// Available balance topped up from outside the ledger.
    Deposit,
    /// Available moved to escrow at commit.
    Hold,
    /// Escrow released from the buyer at payout.
    Release,
    /// Provider credited from a released escrow.
    Payout,
    /// Escrow returned to the buyer's available balance.
    Refund,
}

/// A single audit record of one account's balance mutation.
///
/// Appended inside the same critical section as the mutation it records, so
/// the `*_after` snapshots are exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique entry ID (time-ordered).
    pub id: JournalEntryId,
    /// Transaction this entry belongs to; `None` for deposits.
    pub transaction_id: Option<TransactionId>,
    /// Account affected.
    pub user_id: UserId,
    /// Why the balance moved.
    pub kind: JournalKind,
    /// Amount moved.
    pub amount: Credits,
    /// Available balance after this entry.
    pub available_after: Credits,
    /// Escrow balance after this entry.
    pub escrow_after: Credits,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(
        transaction_id: Option<TransactionId>,
        user_id: UserId,
        kind: JournalKind,
        amount: Credits,
        available_after: Credits,
        escrow_after: Credits,
    ) -> Self {
        Self {
            id: JournalEntryId::new(),
            transaction_id,
            user_id,
            kind,
            amount,
            available_after,
            escrow_after,
            created_at: Utc::now(),
        }
    }
}

/// In-memory append-only journal.
#[derive(Debug, Default)]
pub struct Journal {
    entries: RwLock<Vec<JournalEntry>>,
}

impl Journal {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn append(&self, entry: JournalEntry) {
        self.entries.write().push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries touching a user's account, oldest first.
    pub fn entries_for_user(&self, user_id: &UserId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// All entries belonging to a transaction, oldest first.
    pub fn entries_for_transaction(&self, transaction_id: TransactionId) -> Vec<JournalEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.transaction_id == Some(transaction_id))
            .cloned()
            .collect()
    }

    /// Sum of all deposits ever journaled.
    ///
    /// Escrow operations only move credits between accounts, so at any quiet
    /// point this equals the total credits held across all accounts.
    pub fn total_deposited(&self) -> Credits {
        self.entries
            .read()
            .iter()
            .filter(|e| e.kind == JournalKind::Deposit)
            .map(|e| e.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_query() {
        let journal = Journal::new();
        let txn = TransactionId::new();

        journal.append(JournalEntry::new(
            None,
            UserId::new("alice"),
            JournalKind::Deposit,
            Credits::new(500),
            Credits::new(500),
            Credits::ZERO,
        ));
        journal.append(JournalEntry::new(
            Some(txn),
            UserId::new("alice"),
            JournalKind::Hold,
            Credits::new(200),
            Credits::new(300),
            Credits::new(200),
        ));

        assert_eq!(journal.len(), 2);
        assert_eq!(journal.entries_for_user(&UserId::new("alice")).len(), 2);
        assert_eq!(journal.entries_for_user(&UserId::new("bob")).len(), 0);

        let for_txn = journal.entries_for_transaction(txn);
        assert_eq!(for_txn.len(), 1);
        assert_eq!(for_txn[0].kind, JournalKind::Hold);
        assert_eq!(for_txn[0].escrow_after, Credits::new(200));
    }

    #[test]
    fn test_total_deposited_ignores_moves() {
        let journal = Journal::new();

        journal.append(JournalEntry::new(
            None,
            UserId::new("alice"),
            JournalKind::Deposit,
            Credits::new(500),
            Credits::new(500),
            Credits::ZERO,
        ));
        journal.append(JournalEntry::new(
            Some(TransactionId::new()),
            UserId::new("alice"),
            JournalKind::Hold,
            Credits::new(200),
            Credits::new(300),
            Credits::new(200),
        ));
        journal.append(JournalEntry::new(
            None,
            UserId::new("bob"),
            JournalKind::Deposit,
            Credits::new(100),
            Credits::new(100),
            Credits::ZERO,
        ));

        assert_eq!(journal.total_deposited(), Credits::new(600));
    }
}

//! Queryable transaction history.

use dashmap::DashMap;
use tracing::debug;

use escrowcore_common::{
    Credits, Timestamp, Transaction, TransactionId, TransactionStatus, UserId,
};

/// Append-only record of every transaction and its status transitions.
///
/// The escrow engine is the sole writer; everything else reads. Reads are
/// lock-free snapshots of individual rows.
pub struct TransactionLedger {
    transactions: DashMap<TransactionId, Transaction>,
}

impl TransactionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
        }
    }

    /// Idempotent upsert keyed by transaction id.
    pub fn record(&self, transaction: Transaction) {
        debug!(
            transaction_id = %transaction.id,
            status = %transaction.status,
            "Transaction recorded"
        );
        self.transactions.insert(transaction.id, transaction);
    }

    /// Point lookup.
    pub fn get(&self, transaction_id: TransactionId) -> Option<Transaction> {
        self.transactions
            .get(&transaction_id)
            .map(|entry| entry.clone())
    }

    /// Transactions where the user is buyer or provider, newest first.
    pub fn list_for_user(
        &self,
        user_id: &UserId,
        status_filter: Option<TransactionStatus>,
    ) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| entry.is_participant(user_id))
            .filter(|entry| status_filter.map_or(true, |status| entry.status == status))
            .map(|entry| entry.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// Ids of pending transactions created before `cutoff`, oldest first.
    pub fn pending_older_than(&self, cutoff: Timestamp) -> Vec<TransactionId> {
        let mut stale: Vec<(Timestamp, TransactionId)> = self
            .transactions
            .iter()
            .filter(|entry| entry.status == TransactionStatus::Pending)
            .filter(|entry| entry.created_at < cutoff)
            .map(|entry| (entry.created_at, entry.id))
            .collect();
        stale.sort_by_key(|(created_at, _)| *created_at);
        stale.into_iter().map(|(_, id)| id).collect()
    }

    /// Sum of amounts this buyer currently has held in escrow
    /// (pending and disputed rows).
    pub fn escrow_held_for(&self, buyer: &UserId) -> Credits {
        self.transactions
            .iter()
            .filter(|entry| &entry.buyer == buyer)
            .filter(|entry| entry.status.holds_escrow())
            .map(|entry| entry.amount)
            .sum()
    }

    /// Every distinct buyer that appears in the ledger.
    pub fn buyers(&self) -> Vec<UserId> {
        let mut buyers: Vec<UserId> = self
            .transactions
            .iter()
            .map(|entry| entry.buyer.clone())
            .collect();
        buyers.sort();
        buyers.dedup();
        buyers
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-transaction transition guards.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use escrowcore_common::{EscrowError, Result, TransactionId};

/// Tracks which transactions have a status transition in flight.
///
/// Only one transition per transaction may run at a time. A second caller
/// arriving while the claim is held fails fast with `ConflictRetry` rather
/// than queueing; the caller re-checks status and retries if still sensible.
pub struct TransitionGuards {
    in_flight: Arc<DashMap<TransactionId, ()>>,
}

impl TransitionGuards {
    /// Create an empty guard set.
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Claim a transaction for a transition.
    pub fn claim(&self, transaction_id: TransactionId) -> Result<TransitionGuard> {
        match self.in_flight.entry(transaction_id) {
            Entry::Occupied(_) => Err(EscrowError::ConflictRetry),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(TransitionGuard {
                    transaction_id,
                    in_flight: Arc::clone(&self.in_flight),
                })
            }
        }
    }

    /// Check if a transaction currently has a transition in flight.
    pub fn is_claimed(&self, transaction_id: TransactionId) -> bool {
        self.in_flight.contains_key(&transaction_id)
    }

    /// Number of transitions currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl Default for TransitionGuards {
    fn default() -> Self {
        Self::new()
    }
}

/// An exclusive claim on one transaction's transition. Released on drop.
pub struct TransitionGuard {
    transaction_id: TransactionId,
    in_flight: Arc<DashMap<TransactionId, ()>>,
}

impl TransitionGuard {
    /// The claimed transaction.
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.transaction_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_release() {
        let guards = TransitionGuards::new();
        let txn = TransactionId::new();

        let guard = guards.claim(txn).unwrap();
        assert!(guards.is_claimed(txn));
        assert_eq!(guards.in_flight_count(), 1);

        drop(guard);
        assert!(!guards.is_claimed(txn));
        assert_eq!(guards.in_flight_count(), 0);
    }

    #[test]
    fn test_second_claim_conflicts() {
        let guards = TransitionGuards::new();
        let txn = TransactionId::new();

        let _guard = guards.claim(txn).unwrap();
        assert!(matches!(guards.claim(txn), Err(EscrowError::ConflictRetry)));
    }

    #[test]
    fn test_reclaim_after_release() {
        let guards = TransitionGuards::new();
        let txn = TransactionId::new();

        drop(guards.claim(txn).unwrap());
        assert!(guards.claim(txn).is_ok());
    }

    #[test]
    fn test_distinct_transactions_are_independent() {
        let guards = TransitionGuards::new();
        let _a = guards.claim(TransactionId::new()).unwrap();
        let _b = guards.claim(TransactionId::new()).unwrap();
        assert_eq!(guards.in_flight_count(), 2);
    }

    #[test]
    fn test_racing_claims_yield_one_winner() {
        let guards = Arc::new(TransitionGuards::new());
        let txn = TransactionId::new();
        let barrier = Arc::new(std::sync::Barrier::new(4));

        // Keep any won guards alive until after counting, so a winner's
        // release cannot hand the claim to a slower thread mid-test.
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let guards = Arc::clone(&guards);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    guards.claim(txn)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
    }
}

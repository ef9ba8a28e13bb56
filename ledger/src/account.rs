//! Account definitions for the ledger.

use chrono::{DateTime, Utc};
use escrowcore_common::{Credits, UserId};
use serde::{Deserialize, Serialize};

use crate::balance::AccountBalance;

/// A ledger account holding a user's credits.
///
/// Mutated only by [`crate::store::AccountStore`] inside the account's
/// critical section. Accounts are never deleted, only zeroed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Owning user.
    pub user_id: UserId,
    /// Credits immediately spendable.
    pub available: Credits,
    /// Credits held pending transaction resolution.
    pub escrow: Credits,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balances.
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            available: Credits::ZERO,
            escrow: Credits::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total wealth (available + escrow).
    pub fn total(&self) -> Credits {
        self.available.saturating_add(self.escrow)
    }

    /// Check if the available balance covers an amount.
    pub fn can_debit(&self, amount: Credits) -> bool {
        self.available >= amount
    }

    /// Point-in-time balance snapshot.
    pub fn snapshot(&self) -> AccountBalance {
        AccountBalance {
            user_id: self.user_id.clone(),
            available: self.available,
            escrow: self.escrow,
            updated_at: self.updated_at,
        }
    }
}

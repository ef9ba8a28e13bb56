//! Account balance snapshots.

use chrono::{DateTime, Utc};
use escrowcore_common::{Credits, UserId};
use serde::{Deserialize, Serialize};

/// Account balance at a point in time.
///
/// A snapshot taken under the account lock; by the time a caller inspects it
/// the live balances may already have moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Owning user.
    pub user_id: UserId,
    /// Credits immediately spendable.
    pub available: Credits,
    /// Credits held in escrow.
    pub escrow: Credits,
    /// When the underlying account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Total wealth (available + escrow).
    pub fn total(&self) -> Credits {
        self.available.saturating_add(self.escrow)
    }

    /// Check if the available balance covers an amount.
    pub fn can_cover(&self, amount: Credits) -> bool {
        self.available >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_totals() {
        let balance = AccountBalance {
            user_id: UserId::new("alice"),
            available: Credits::new(300),
            escrow: Credits::new(200),
            updated_at: Utc::now(),
        };

        assert_eq!(balance.total(), Credits::new(500));
        assert!(balance.can_cover(Credits::new(300)));
        assert!(!balance.can_cover(Credits::new(301)));
    }
}

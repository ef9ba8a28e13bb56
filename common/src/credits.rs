//! The credits unit for EscrowCore balances and amounts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// An amount of platform credits (EXC).
///
/// Credits are integral and unsigned, so negative balances are impossible by
/// construction. All arithmetic is checked; callers decide how to surface an
/// overflow or underflow rather than ever observing a wrapped value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(u64);

impl Credits {
    /// Zero credits.
    pub const ZERO: Credits = Credits(0);

    /// Create a new amount.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value.
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Check if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition; `None` on overflow.
    pub fn checked_add(self, other: Credits) -> Option<Credits> {
        self.0.checked_add(other.0).map(Credits)
    }

    /// Checked subtraction; `None` if `other` exceeds `self`.
    pub fn checked_sub(self, other: Credits) -> Option<Credits> {
        self.0.checked_sub(other.0).map(Credits)
    }

    /// Saturating addition, for aggregate reporting only.
    pub fn saturating_add(self, other: Credits) -> Credits {
        Credits(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} EXC", self.0)
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Credits>>(iter: I) -> Self {
        iter.fold(Credits::ZERO, |acc, c| acc.saturating_add(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let a = Credits::new(100);
        let b = Credits::new(60);

        assert_eq!(a.checked_add(b), Some(Credits::new(160)));
        assert_eq!(a.checked_sub(b), Some(Credits::new(40)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Credits::new(u64::MAX).checked_add(Credits::new(1)), None);
    }

    #[test]
    fn test_display_includes_unit() {
        assert_eq!(Credits::new(200).to_string(), "200 EXC");
    }

    #[test]
    fn test_sum_over_iterator() {
        let total: Credits = [10u64, 20, 30].into_iter().map(Credits::new).sum();
        assert_eq!(total, Credits::new(60));
    }

    #[test]
    fn test_serde_transparent() {
        let amount = Credits::new(500);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "500");
        let back: Credits = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}

//! Transaction model and state machine for EscrowCore.

use crate::{Credits, EscrowError, ServiceId, TransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transaction status representing the escrow lifecycle state.
///
/// Serialized lowercase; these exact strings are what clients persist and
/// filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Funds held in escrow, awaiting buyer release.
    Pending,
    /// Provider paid; terminal.
    Completed,
    /// Frozen for arbitration; funds remain held.
    Disputed,
    /// Buyer refunded; terminal.
    Cancelled,
}

impl TransactionStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }

    /// Check if a transaction in this status holds buyer credits in escrow.
    pub fn holds_escrow(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::Disputed
        )
    }

    /// Get valid next states from current state.
    pub fn valid_transitions(&self) -> &[TransactionStatus] {
        match self {
            TransactionStatus::Pending => &[
                TransactionStatus::Completed,
                TransactionStatus::Disputed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Disputed => &[
                TransactionStatus::Completed,
                TransactionStatus::Cancelled,
            ],
            TransactionStatus::Completed => &[],
            TransactionStatus::Cancelled => &[],
        }
    }

    /// Check if transition to given state is valid.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Disputed => "disputed",
            TransactionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of arbitrating a disputed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Pay the provider; transaction completes.
    Complete,
    /// Refund the buyer; transaction is cancelled.
    Refund,
}

/// Record of a dispute raised against a transaction. Set exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Who raised the dispute (buyer or provider).
    pub raised_by: UserId,
    /// Free-form reason supplied by the disputing party.
    pub reason: String,
    /// When the dispute was raised.
    pub raised_at: DateTime<Utc>,
}

/// A single escrow transaction between a buyer and a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// The paying party whose credits are held.
    pub buyer: UserId,
    /// The party paid on release.
    pub provider: UserId,
    /// Optional reference to the marketplace listing being purchased.
    pub service: Option<ServiceId>,
    /// Escrowed amount. Fixed at creation, never mutated.
    pub amount: Credits,
    /// Current lifecycle status.
    pub status: TransactionStatus,
    /// Dispute details, present once the transaction has been disputed.
    pub dispute: Option<DisputeRecord>,
    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
    /// When the transaction last changed.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a new pending transaction.
    pub fn new(
        buyer: UserId,
        provider: UserId,
        service: Option<ServiceId>,
        amount: Credits,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            buyer,
            provider,
            service,
            amount,
            status: TransactionStatus::Pending,
            dispute: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status, stamping `updated_at`.
    pub fn transition_to(&mut self, new_status: TransactionStatus) -> Result<(), EscrowError> {
        if !self.status.can_transition_to(new_status) {
            return Err(EscrowError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }

        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `disputed`, recording who raised it and why.
    pub fn record_dispute(
        &mut self,
        raised_by: UserId,
        reason: impl Into<String>,
    ) -> Result<(), EscrowError> {
        self.transition_to(TransactionStatus::Disputed)?;
        self.dispute = Some(DisputeRecord {
            raised_by,
            reason: reason.into(),
            raised_at: self.updated_at,
        });
        Ok(())
    }

    /// Check whether a user is the buyer or the provider.
    pub fn is_participant(&self, user: &UserId) -> bool {
        &self.buyer == user || &self.provider == user
    }
}

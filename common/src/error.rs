//! Error types for EscrowCore operations.

use crate::{Credits, TransactionId, TransactionStatus, UserId};
use thiserror::Error;

/// Main error type for EscrowCore operations.
#[derive(Error, Debug)]
pub enum EscrowError {
    /// Amount was zero (amounts are unsigned; zero is the only invalid value).
    #[error("Invalid amount: must be positive")]
    InvalidAmount,

    /// Amount outside the configured bounds.
    #[error("Amount {amount} out of range: min {min}, max {max}")]
    AmountOutOfRange {
        amount: Credits,
        min: Credits,
        max: Credits,
    },

    /// Buyer's available balance cannot cover the commit.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Credits,
        available: Credits,
    },

    /// Escrow balance cannot cover a release or refund.
    #[error("Escrow underflow: required {required}, held {held}")]
    EscrowUnderflow { required: Credits, held: Credits },

    /// A credit would overflow the balance.
    #[error("Balance overflow crediting account")]
    BalanceOverflow,

    /// Invalid state transition.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Actor is not permitted to perform this action.
    #[error("Unauthorized: {actor} may not {action}")]
    Unauthorized { actor: UserId, action: String },

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(UserId),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Another transition on the same transaction is in flight.
    /// Safe to retry after re-checking current status.
    #[error("Concurrent update detected, retry after re-checking status")]
    ConflictRetry,

    /// Malformed or self-inconsistent request.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EscrowError {
    /// Check if this error is retryable.
    ///
    /// Only `ConflictRetry` may be retried automatically, and only after the
    /// caller has re-fetched the transaction status. Every other error is a
    /// definitive outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EscrowError::ConflictRetry)
    }

    /// Get suggested retry delay in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            EscrowError::ConflictRetry => Some(50),
            _ => None,
        }
    }

    /// Get stable error code for protocol messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            EscrowError::InvalidAmount => "INVALID_AMOUNT",
            EscrowError::AmountOutOfRange { .. } => "AMOUNT_OUT_OF_RANGE",
            EscrowError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            EscrowError::EscrowUnderflow { .. } => "ESCROW_UNDERFLOW",
            EscrowError::BalanceOverflow => "BALANCE_OVERFLOW",
            EscrowError::InvalidTransition { .. } => "INVALID_TRANSITION",
            EscrowError::Unauthorized { .. } => "UNAUTHORIZED",
            EscrowError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            EscrowError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            EscrowError::ConflictRetry => "CONFLICT_RETRY",
            EscrowError::InvalidRequest { .. } => "INVALID_REQUEST",
            EscrowError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convenience constructor for unauthorized actions.
    pub fn unauthorized(actor: &UserId, action: impl Into<String>) -> Self {
        EscrowError::Unauthorized {
            actor: actor.clone(),
            action: action.into(),
        }
    }

    /// Convenience constructor for malformed requests.
    pub fn invalid_request(message: impl Into<String>, field: Option<&str>) -> Self {
        EscrowError::InvalidRequest {
            message: message.into(),
            field: field.map(String::from),
        }
    }
}

/// Result type alias for EscrowCore operations.
pub type Result<T> = std::result::Result<T, EscrowError>;

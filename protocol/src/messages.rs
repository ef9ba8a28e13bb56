//! Protocol message types.
//!
//! These types represent the messages exchanged between marketplace
//! clients and the escrow engine. Every message carries the protocol
//! version, its type tag, and a timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use escrowcore_common::{
    Credits, EscrowError, Resolution, ServiceId, Transaction, TransactionId, TransactionStatus,
    UserId,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Message type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    CommitRequest,
    CommitResponse,
    ReleaseRequest,
    ReleaseResponse,
    DisputeRequest,
    DisputeResponse,
    CancelRequest,
    CancelResponse,
    ResolveRequest,
    ResolveResponse,
    BalanceRequest,
    BalanceResponse,
    HistoryRequest,
    HistoryResponse,
    ErrorResponse,
}

/// Commit request: hold the buyer's credits in escrow for a purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// The paying buyer.
    pub buyer_id: UserId,
    /// The provider to be paid on release.
    pub provider_id: UserId,
    /// Marketplace listing being purchased.
    pub service_id: Option<ServiceId>,
    /// Amount to hold, in EXC.
    pub amount_exc: Credits,
}

impl CommitRequest {
    /// Create a new commit request.
    pub fn new(
        buyer_id: UserId,
        provider_id: UserId,
        service_id: Option<ServiceId>,
        amount_exc: Credits,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::CommitRequest,
            timestamp: Utc::now(),
            buyer_id,
            provider_id,
            service_id,
            amount_exc,
        }
    }
}

/// Commit response carrying the new transaction's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// The pending transaction created by the commit.
    pub transaction_id: TransactionId,
}

impl CommitResponse {
    /// Create a new commit response.
    pub fn new(transaction_id: TransactionId) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::CommitResponse,
            timestamp: Utc::now(),
            transaction_id,
        }
    }
}

/// Release request: pay the provider out of escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// Transaction to release.
    pub transaction_id: TransactionId,
    /// Who is asking. Must be the buyer.
    pub actor_id: UserId,
}

impl ReleaseRequest {
    /// Create a new release request.
    pub fn new(transaction_id: TransactionId, actor_id: UserId) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::ReleaseRequest,
            timestamp: Utc::now(),
            transaction_id,
            actor_id,
        }
    }
}

/// Release response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the release was applied.
    pub success: bool,
}

impl ReleaseResponse {
    /// Create a new release response.
    pub fn new(success: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::ReleaseResponse,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Dispute request: freeze a pending transaction for arbitration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// Transaction to dispute.
    pub transaction_id: TransactionId,
    /// Who is disputing. Must be the buyer or the provider.
    pub actor_id: UserId,
    /// Why. Required, non-empty.
    pub reason: String,
}

impl DisputeRequest {
    /// Create a new dispute request.
    pub fn new(transaction_id: TransactionId, actor_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::DisputeRequest,
            timestamp: Utc::now(),
            transaction_id,
            actor_id,
            reason: reason.into(),
        }
    }
}

/// Dispute response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the dispute was recorded.
    pub success: bool,
}

impl DisputeResponse {
    /// Create a new dispute response.
    pub fn new(success: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::DisputeResponse,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Cancel request: refund the buyer out of escrow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// Transaction to cancel.
    pub transaction_id: TransactionId,
    /// Who is asking. Must be the buyer.
    pub actor_id: UserId,
}

impl CancelRequest {
    /// Create a new cancel request.
    pub fn new(transaction_id: TransactionId, actor_id: UserId) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::CancelRequest,
            timestamp: Utc::now(),
            transaction_id,
            actor_id,
        }
    }
}

/// Cancel response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the cancel was applied.
    pub success: bool,
}

impl CancelResponse {
    /// Create a new cancel response.
    pub fn new(success: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::CancelResponse,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Resolve request: arbitrate a disputed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// Transaction to resolve.
    pub transaction_id: TransactionId,
    /// Arbiter's decision.
    pub resolution: Resolution,
}

impl ResolveRequest {
    /// Create a new resolve request.
    pub fn new(transaction_id: TransactionId, resolution: Resolution) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::ResolveRequest,
            timestamp: Utc::now(),
            transaction_id,
            resolution,
        }
    }
}

/// Resolve response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Whether the resolution was applied.
    pub success: bool,
}

impl ResolveResponse {
    /// Create a new resolve response.
    pub fn new(success: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::ResolveResponse,
            timestamp: Utc::now(),
            success,
        }
    }
}

/// Balance request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// User whose balances are requested.
    pub user_id: UserId,
}

impl BalanceRequest {
    /// Create a new balance request.
    pub fn new(user_id: UserId) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::BalanceRequest,
            timestamp: Utc::now(),
            user_id,
        }
    }
}

/// Balance response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Spendable credits.
    pub available_exc: Credits,
    /// Credits held for pending and disputed transactions.
    pub escrow_exc: Credits,
}

impl BalanceResponse {
    /// Create a new balance response.
    pub fn new(available_exc: Credits, escrow_exc: Credits) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::BalanceResponse,
            timestamp: Utc::now(),
            available_exc,
            escrow_exc,
        }
    }
}

/// History request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// User whose transactions are requested.
    pub user_id: UserId,
    /// Only rows in this status, if set.
    pub status: Option<TransactionStatus>,
}

impl HistoryRequest {
    /// Create a new history request.
    pub fn new(user_id: UserId, status: Option<TransactionStatus>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::HistoryRequest,
            timestamp: Utc::now(),
            user_id,
            status,
        }
    }
}

/// History response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Matching transactions, newest first.
    pub transactions: Vec<Transaction>,
}

impl HistoryResponse {
    /// Create a new history response.
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::HistoryResponse,
            timestamp: Utc::now(),
            transactions,
        }
    }
}

/// Error response sent for any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Protocol version.
    pub version: String,
    /// Message type identifier.
    pub message_type: MessageType,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
    /// Stable error code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Whether the client may retry after re-checking state.
    pub retryable: bool,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: MessageType::ErrorResponse,
            timestamp: Utc::now(),
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl From<&EscrowError> for ErrorResponse {
    fn from(err: &EscrowError) -> Self {
        Self::new(err.error_code(), err.to_string(), err.is_retryable())
    }
}

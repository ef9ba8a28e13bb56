//! Request dispatch for the wire protocol.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use escrowcore_common::{is_fresh, EscrowError};
use escrowcore_protocol::{
    BalanceRequest, BalanceResponse, CancelRequest, CancelResponse, CommitRequest, CommitResponse,
    DisputeRequest, DisputeResponse, ErrorResponse, HistoryRequest, HistoryResponse, MessageType,
    ReleaseRequest, ReleaseResponse, ResolveRequest, ResolveResponse,
};

use crate::engine::EscrowEngine;

/// Decodes protocol requests, runs them against the engine, and encodes
/// the response. One instance serves every connection.
pub struct EscrowService {
    engine: Arc<EscrowEngine>,
}

impl EscrowService {
    /// Create a service over an engine.
    pub fn new(engine: Arc<EscrowEngine>) -> Self {
        Self { engine }
    }

    /// The engine behind this service.
    pub fn engine(&self) -> &Arc<EscrowEngine> {
        &self.engine
    }

    /// Handle one JSON-encoded request line, returning the JSON response.
    ///
    /// Never fails: anything that goes wrong becomes an `ERROR_RESPONSE`
    /// with the error's stable code.
    pub fn handle_line(&self, line: &str) -> String {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                return encode(&ErrorResponse::from(&EscrowError::invalid_request(
                    format!("Malformed JSON: {err}"),
                    None,
                )));
            }
        };

        let message_type = match peek_message_type(&value) {
            Some(message_type) => message_type,
            None => {
                return encode(&ErrorResponse::from(&EscrowError::invalid_request(
                    "Missing or unknown message_type",
                    Some("message_type"),
                )));
            }
        };

        self.warn_if_stale(&value, message_type);

        match self.dispatch(message_type, value) {
            Ok(response) => response,
            Err(err) => encode(&ErrorResponse::from(&err)),
        }
    }

    fn dispatch(&self, message_type: MessageType, value: Value) -> Result<String, EscrowError> {
        match message_type {
            MessageType::CommitRequest => {
                let request: CommitRequest = decode(value, "COMMIT_REQUEST")?;
                let transaction = self.engine.commit(
                    &request.buyer_id,
                    &request.provider_id,
                    request.service_id,
                    request.amount_exc,
                )?;
                Ok(encode(&CommitResponse::new(transaction.id)))
            }
            MessageType::ReleaseRequest => {
                let request: ReleaseRequest = decode(value, "RELEASE_REQUEST")?;
                self.engine
                    .release(request.transaction_id, &request.actor_id)?;
                Ok(encode(&ReleaseResponse::new(true)))
            }
            MessageType::DisputeRequest => {
                let request: DisputeRequest = decode(value, "DISPUTE_REQUEST")?;
                self.engine
                    .dispute(request.transaction_id, &request.actor_id, &request.reason)?;
                Ok(encode(&DisputeResponse::new(true)))
            }
            MessageType::CancelRequest => {
                let request: CancelRequest = decode(value, "CANCEL_REQUEST")?;
                self.engine
                    .cancel(request.transaction_id, &request.actor_id)?;
                Ok(encode(&CancelResponse::new(true)))
            }
            MessageType::ResolveRequest => {
                let request: ResolveRequest = decode(value, "RESOLVE_REQUEST")?;
                self.engine
                    .resolve(request.transaction_id, request.resolution)?;
                Ok(encode(&ResolveResponse::new(true)))
            }
            MessageType::BalanceRequest => {
                let request: BalanceRequest = decode(value, "BALANCE_REQUEST")?;
                let balance = self.engine.balances(&request.user_id)?;
                Ok(encode(&BalanceResponse::new(
                    balance.available,
                    balance.escrow,
                )))
            }
            MessageType::HistoryRequest => {
                let request: HistoryRequest = decode(value, "HISTORY_REQUEST")?;
                let transactions = self
                    .engine
                    .list_for_user(&request.user_id, request.status);
                Ok(encode(&HistoryResponse::new(transactions)))
            }
            other => Err(EscrowError::invalid_request(
                format!("{other:?} is not a request message type"),
                Some("message_type"),
            )),
        }
    }

    fn warn_if_stale(&self, value: &Value, message_type: MessageType) {
        let timestamp = value
            .get("timestamp")
            .cloned()
            .and_then(|ts| serde_json::from_value(ts).ok());

        if let Some(timestamp) = timestamp {
            if !is_fresh(timestamp) {
                warn!(
                    message_type = ?message_type,
                    timestamp = %timestamp,
                    "Request timestamp outside the freshness window"
                );
            }
        } else {
            debug!(message_type = ?message_type, "Request carries no usable timestamp");
        }
    }
}

fn peek_message_type(value: &Value) -> Option<MessageType> {
    value
        .get("message_type")
        .cloned()
        .and_then(|tag| serde_json::from_value(tag).ok())
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, name: &str) -> Result<T, EscrowError> {
    serde_json::from_value(value).map_err(|err| {
        EscrowError::invalid_request(format!("Malformed {name} payload: {err}"), None)
    })
}

fn encode<T: Serialize>(response: &T) -> String {
    serde_json::to_string(response).unwrap_or_else(|err| {
        warn!(error = %err, "Response serialization failed");
        concat!(
            r#"{"version":"1.0","message_type":"ERROR_RESPONSE","#,
            r#""code":"INTERNAL_ERROR","message":"Response serialization failed","#,
            r#""retryable":false}"#,
        )
        .to_string()
    })
}

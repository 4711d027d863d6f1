//! AMQP message definitions and serialization
//!
//! Host controllers and the game master talk request/response over the
//! broker. A request names a method and carries JSON params; the response
//! carries an HTTP-style status and a JSON body.

use crate::error::{MatchmakingError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Default exchange, used to answer on a `reply_to` queue
pub const DEFAULT_EXCHANGE: &str = "";

/// Host controller methods
pub const METHOD_SPAWN: &str = "spawn";
pub const METHOD_TERMINATE: &str = "terminate";
pub const METHOD_HEARTBEAT: &str = "heartbeat";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl RpcResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "message": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error text of a failed response
    pub fn message(&self) -> String {
        match &self.body {
            Value::String(message) => message.clone(),
            Value::Object(body) => body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            other => other.to_string(),
        }
    }

    /// Body of a 2xx response, a non-2xx status surfaces as a spawn failure
    pub fn into_body(self) -> Result<Value> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(MatchmakingError::SpawnFailed {
            code: self.status,
            message: self.message(),
        }
        .into())
    }
}

/// Serialize a message to JSON bytes
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| {
        MatchmakingError::InternalError {
            message: format!("Failed to serialize message: {}", e),
        }
        .into()
    })
}

/// Deserialize a message from JSON bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        MatchmakingError::InvalidRequest {
            reason: format!("Failed to deserialize message: {}", e),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_status_mapping() {
        let ok = RpcResponse::ok(json!({"location": {"host": "h1"}}));
        assert!(ok.clone().into_body().is_ok());

        let err = RpcResponse::error(502, "bad gateway").into_body().unwrap_err();
        match err.downcast_ref::<MatchmakingError>() {
            Some(MatchmakingError::SpawnFailed { code, message }) => {
                assert_eq!(*code, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_response_message_from_plain_body() {
        let response = RpcResponse {
            status: 409,
            body: json!("room exists"),
        };
        assert_eq!(response.message(), "room exists");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<RpcRequest>(b"not json").unwrap_err();
        assert_eq!(crate::error::status_of(&err), 400);

        let request: RpcRequest = decode(br#"{"method": "heartbeat"}"#).unwrap();
        assert_eq!(request.method, METHOD_HEARTBEAT);
        assert_eq!(request.params, Value::Null);
    }
}

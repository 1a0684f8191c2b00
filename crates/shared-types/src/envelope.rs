//! # Work Envelope
//!
//! The JSON object carried on both sides of the message bus.
//!
//! - request: `{id, method, params}` pushed onto a partition queue
//! - success: `{id, result}` published on the result topic
//! - failure: `{id, error: {code, message}}` published on the result topic
//!
//! Bodies are UTF-8 JSON bytes. The landlord forwards a success body to its
//! HTTP caller verbatim, so results are never re-encoded on the way back.

use crate::errors::EnvelopeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes used on the result topic.
pub mod codes {
    /// Method outside the renter allow-list.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Dispatch or network failure.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// A unit of work as admitted by the landlord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRequest {
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl WorkRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Validate an already-parsed JSON value.
    ///
    /// Checks, in order: object, string `id`, string `method`, array `params`.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let id = match map.remove("id") {
            Some(Value::String(id)) => id,
            _ => return Err(EnvelopeError::InvalidId),
        };
        let method = match map.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(EnvelopeError::InvalidMethod),
        };
        let params = match map.remove("params") {
            Some(Value::Array(params)) => params,
            _ => return Err(EnvelopeError::InvalidParams),
        };

        Ok(Self { id, method, params })
    }

    /// Parse and validate raw body bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Wire error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn method_not_found() -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: codes::INTERNAL_ERROR,
            message: message.into(),
        }
    }
}

/// A completion published on the result topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl WorkResult {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: RpcError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))
    }
}

//! JSON-RPC 2.0 types for the catalog service boundary.
//!
//! Every round of a query is one JSON-RPC call. The method is the operation
//! name (`"query"`) and the params are the current request document. The
//! result is a [`RoundEnvelope`] carrying the response document plus the
//! server's "interaction finished" marker, when it sends one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Response;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` / `error` is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Option<u64>,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    pub fn failure(id: u64, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Result payload of one round.
///
/// `finished` is the server's terminal marker. `None` means the server did
/// not say, and the engine decides from the response content instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundEnvelope {
    pub response: Response,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

impl RoundEnvelope {
    pub fn new(response: Response, finished: bool) -> Self {
        Self {
            response,
            finished: Some(finished),
        }
    }

    /// A response with no terminal marker.
    pub fn bare(response: Response) -> Self {
        Self {
            response,
            finished: None,
        }
    }

    /// Decode a JSON-RPC result into an envelope.
    ///
    /// Objects without a `response` key are taken as a bare response
    /// document.
    pub fn from_result(result: Value) -> Result<Self, Value> {
        let wrapped = matches!(&result, Value::Object(fields) if fields.contains_key("response"));
        if wrapped {
            serde_json::from_value(result.clone()).map_err(|_| result)
        } else {
            Response::try_from(result).map(Self::bare)
        }
    }
}

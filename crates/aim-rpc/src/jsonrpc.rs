//! JSON-RPC 2.0 envelope types, plus the `api_version` extension the
//! gateway adds on top (spec §4.8, §6 "JSON-RPC envelope").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current and minimum-supported API version (spec §4.8 step 7).
pub const CURRENT_API_VERSION: i64 = 1;
pub const MIN_SUPPORTED_API_VERSION: i64 = 1;

/// A parsed JSON-RPC 2.0 request, plus the optional top-level
/// `api_version` extension.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub api_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }
}

/// A JSON-RPC 2.0 response carrying either `result` or `error`, never both
/// (spec §7 "either result or error").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "default_jsonrpc_version")]
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<RpcError>,
}

fn default_jsonrpc_version() -> &'static str {
    "2.0"
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(error) }
    }

    /// Swap this response's transport id for a fresh call's id; used when
    /// an idempotent replay serves a stored response body verbatim except
    /// for the id (spec §4.3, §8 "Idempotency cache round-trip").
    pub fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }
}

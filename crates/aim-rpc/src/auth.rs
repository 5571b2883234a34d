//! RPC token extraction, correlation id derivation, and idempotency-key
//! parsing (spec §4.8 steps 3, 8, 10).

use axum::http::HeaderMap;

/// Extract the bearer token from `X-AIM-RPC-Token` or `Authorization:
/// Bearer <t>`, preferring the dedicated header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-aim-rpc-token").and_then(|v| v.to_str().ok()) {
        if !value.is_empty() {
            return Some(value.to_owned());
        }
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_owned())
}

/// Sanitize an incoming `X-AIM-Request-ID` to `[A-Za-z0-9._:-]`, truncated
/// to 128 bytes, with any other byte replaced by `_` (spec §4.8 step 10).
pub fn sanitize_request_id(raw: &str) -> String {
    let truncated: String = raw.bytes().take(128).map(|b| b as char).collect();
    truncated
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-') { c } else { '_' })
        .collect()
}

/// Derive the correlation id for this request: the sanitized
/// `X-AIM-Request-ID` header if present and non-empty; else `rpc.<id>`
/// from the JSON-RPC request id; else `rpc.<unix-ns>`.
pub fn correlation_id(headers: &HeaderMap, rpc_id: &serde_json::Value, unix_nanos: i64) -> String {
    if let Some(raw) = headers.get("x-aim-request-id").and_then(|v| v.to_str().ok()) {
        if !raw.is_empty() {
            return sanitize_request_id(raw);
        }
    }
    match rpc_id {
        serde_json::Value::Null => format!("rpc.{unix_nanos}"),
        serde_json::Value::String(s) if !s.trim().is_empty() => format!("rpc.{}", s.trim()),
        serde_json::Value::Number(n) => format!("rpc.{n}"),
        _ => format!("rpc.{unix_nanos}"),
    }
}

/// The idempotency key header, if present and non-empty.
pub fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-aim-idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_owned())
}

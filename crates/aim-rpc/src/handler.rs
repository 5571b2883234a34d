//! `POST /rpc` handler implementing the full dispatch sequence (spec §4.8).

use crate::auth::{correlation_id, extract_token, idempotency_key};
use crate::cors::{apply_headers, is_allowed_origin};
use crate::dispatch;
use crate::error_codes::{API_VERSION_DEPRECATED, API_VERSION_UNSUPPORTED, IDEMPOTENCY_CONFLICT, INVALID_REQUEST, PARSE_ERROR};
use crate::jsonrpc::{RpcRequest, RpcResponse, CURRENT_API_VERSION, MIN_SUPPORTED_API_VERSION};
use crate::state::AppState;
use aim_limits::idempotency::{hash_request, Lookup};
use aim_limits::RateLimiter;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use std::net::SocketAddr;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub async fn handle_rpc(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    if let Some(origin) = origin {
        if !is_allowed_origin(origin, state.config.cors_allow_null_origin) {
            tracing::warn!(%origin, "rpc request rejected: origin not allowed");
            return forbidden_response();
        }
    }

    let token = extract_token(&headers);
    let rate_key = RateLimiter::key_for(token.as_deref(), &peer.ip().to_string());
    if state.rate_limiting_enabled() && !state.rpc_rate_limiter.allow(&rate_key, state.clock.as_ref()) {
        tracing::warn!(key = %rate_key, "rpc rate limit exceeded");
        return too_many_requests_response(origin);
    }

    if state.auth_enforced() {
        let required = state.config.rpc_token.as_deref().unwrap_or("");
        if token.as_deref() != Some(required) || required.is_empty() {
            tracing::warn!(peer = %peer, "rpc request rejected: missing or invalid token");
            return unauthorized_response(origin);
        }
    }

    if body.len() > MAX_BODY_BYTES {
        return error_response(origin, Value::Null, INVALID_REQUEST, "request body exceeds 1 MiB");
    }

    let mut de = serde_json::Deserializer::from_slice(&body);
    let request: RpcRequest = match serde::Deserialize::deserialize(&mut de) {
        Ok(r) => r,
        Err(e) => return error_response(origin, Value::Null, PARSE_ERROR, format!("invalid JSON-RPC request: {e}")),
    };
    if de.end().is_err() {
        return error_response(origin, request.id, INVALID_REQUEST, "trailing data after JSON-RPC request");
    }
    if request.jsonrpc != "2.0" || request.method.is_empty() {
        return error_response(origin, request.id, INVALID_REQUEST, "jsonrpc must be \"2.0\" with a non-empty method");
    }

    match request.api_version {
        Some(v) if v > CURRENT_API_VERSION => {
            return error_response(origin, request.id, API_VERSION_UNSUPPORTED, "api_version is newer than this server supports")
        }
        Some(v) if v < MIN_SUPPORTED_API_VERSION => {
            return error_response(origin, request.id, API_VERSION_DEPRECATED, "api_version is older than this server supports")
        }
        _ => {}
    }

    let now = state.clock.now();
    let idem_header = idempotency_key(&headers);
    let idem_cache_key = idem_header.as_ref().map(|key| {
        aim_limits::idempotency::IdempotencyCache::cache_key(token.as_deref().unwrap_or(""), key)
    });
    let request_hash = hash_request(
        serde_json::json!({ "method": request.method, "params": request.params, "api_version": request.api_version })
            .to_string()
            .as_bytes(),
    );

    if let Some(cache_key) = &idem_cache_key {
        match state.idempotency.get(cache_key, &request_hash, now) {
            Lookup::Conflict => {
                return error_response(origin, request.id, IDEMPOTENCY_CONFLICT, "idempotency key reused with a different request")
            }
            Lookup::Found(cached) => {
                let mut response: RpcResponse = serde_json::from_value(cached).unwrap_or_else(|_| {
                    RpcResponse::failure(Value::Null, crate::jsonrpc::RpcError::new(PARSE_ERROR, "corrupt cached response"))
                });
                response = response.with_id(request.id.clone());
                return ok_response(origin, &headers, &request, now, response);
            }
            Lookup::Miss => {}
        }
    }

    let is_loopback = peer.ip().is_loopback();
    let response = match dispatch::dispatch(&state, &request.method, &request.params, is_loopback).await {
        Ok(result) => RpcResponse::success(request.id.clone(), result),
        Err(err) => RpcResponse::failure(request.id.clone(), err),
    };

    if let Some(cache_key) = &idem_cache_key {
        if let Ok(value) = serde_json::to_value(&response) {
            state.idempotency.set(cache_key, &request_hash, value, now);
        }
    }

    ok_response(origin, &headers, &request, now, response)
}

fn ok_response(
    origin: Option<&str>,
    headers: &HeaderMap,
    request: &RpcRequest,
    now: chrono::DateTime<chrono::Utc>,
    response: RpcResponse,
) -> Response {
    let unix_nanos = now.timestamp_nanos_opt().unwrap_or_default();
    let correlation = correlation_id(headers, &request.id, unix_nanos);
    let mut http_response = Json(response).into_response();
    apply_headers(http_response.headers_mut(), accepted_origin(origin));
    if let Ok(value) = correlation.parse::<axum::http::HeaderValue>() {
        http_response.headers_mut().insert("x-aim-request-id", value);
    }
    http_response
}

fn accepted_origin(origin: Option<&str>) -> Option<&str> {
    origin
}

fn error_response(origin: Option<&str>, id: Value, code: i64, message: impl Into<String>) -> Response {
    let response = RpcResponse::failure(id, crate::jsonrpc::RpcError::new(code, message));
    let mut http_response = Json(response).into_response();
    apply_headers(http_response.headers_mut(), accepted_origin(origin));
    http_response
}

fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, "origin not allowed").into_response()
}

fn unauthorized_response(origin: Option<&str>) -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "missing or invalid rpc token").into_response();
    apply_headers(response.headers_mut(), accepted_origin(origin));
    response
}

fn too_many_requests_response(origin: Option<&str>) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    response.headers_mut().insert("retry-after", axum::http::HeaderValue::from_static("1"));
    apply_headers(response.headers_mut(), accepted_origin(origin));
    response
}

pub async fn handle_rpc_preflight(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    let mut response = StatusCode::NO_CONTENT.into_response();
    apply_headers(response.headers_mut(), origin.filter(|o| is_allowed_origin(o, state.config.cors_allow_null_origin)));
    response
}

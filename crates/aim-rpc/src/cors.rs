//! CORS enforcement and security headers (spec §4.8 step 1).
//!
//! The allowed-origin set is narrow by design — only loopback origins, plus
//! an optional `null` origin for local file-based clients when the config
//! flag is set — so this is hand-rolled rather than reached for
//! `tower_http::cors::CorsLayer`'s wildcard/reflect-everything defaults.

use axum::http::{HeaderMap, HeaderValue};

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("x-frame-options", "DENY"),
    ("permissions-policy", "geolocation=(), camera=(), microphone=()"),
];

/// `true` if `origin` is an allowed loopback origin (any scheme/port over
/// `localhost`, `127.0.0.1`, or `[::1]`), or the literal `null` origin when
/// `allow_null` is set (spec §4.8 step 1).
pub fn is_allowed_origin(origin: &str, allow_null: bool) -> bool {
    if origin == "null" {
        return allow_null;
    }
    let host = strip_scheme_and_port(origin);
    matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1")
}

fn strip_scheme_and_port(origin: &str) -> String {
    let without_scheme = origin.split("://").nth(1).unwrap_or(origin);
    match without_scheme.rfind(':') {
        // Avoid truncating the bracketed IPv6 literal at its internal colons.
        Some(idx) if !without_scheme.starts_with('[') || without_scheme[..idx].ends_with(']') => {
            without_scheme[..idx].to_owned()
        }
        _ => without_scheme.to_owned(),
    }
}

/// Apply the standard security headers plus, when `origin` was accepted,
/// the CORS reflection headers onto `headers`.
pub fn apply_headers(headers: &mut HeaderMap, accepted_origin: Option<&str>) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(*name, HeaderValue::from_static(value));
    }
    if let Some(origin) = accepted_origin {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert("access-control-allow-origin", value);
        }
        headers.insert("access-control-allow-credentials", HeaderValue::from_static("true"));
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static("content-type, x-aim-rpc-token, authorization, x-aim-request-id, x-aim-idempotency-key"),
        );
        headers.insert("access-control-allow-methods", HeaderValue::from_static("POST, GET, OPTIONS"));
    }
}

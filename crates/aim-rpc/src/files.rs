//! `GET /files/{id}`: attachment download, rate-limited separately from
//! the RPC surface (spec §4.2, §4.8 "HTTP surface").

use crate::auth::extract_token;
use crate::cors::is_allowed_origin;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

pub async fn handle_download(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    if let Some(origin) = origin {
        if !is_allowed_origin(origin, state.config.cors_allow_null_origin) {
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    let token = extract_token(&headers);
    let rate_key = aim_limits::RateLimiter::key_for(token.as_deref(), &peer.ip().to_string());
    if state.rate_limiting_enabled() && !state.file_rate_limiter.allow(&rate_key, state.clock.as_ref()) {
        let mut response = (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
        response.headers_mut().insert("retry-after", HeaderValue::from_static("1"));
        return response;
    }

    if state.auth_enforced() {
        let required = state.config.rpc_token.as_deref().unwrap_or("");
        if token.as_deref() != Some(required) || required.is_empty() {
            return (StatusCode::UNAUTHORIZED, "missing or invalid rpc token").into_response();
        }
    }

    let Some(service) = state.service.clone() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "domain service is not wired").into_response();
    };

    match service.download_attachment(id.clone()).await {
        Ok(Some(bytes)) => {
            let mut response = Response::new(Body::from(bytes));
            response
                .headers_mut()
                .insert("content-type", HeaderValue::from_static("application/octet-stream"));
            if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename*=UTF-8''{}", urlencode(&id))) {
                response.headers_mut().insert("content-disposition", value);
            }
            response
        }
        Ok(None) => (StatusCode::NOT_FOUND, "attachment does not exist").into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "failed to load attachment").into_response(),
    }
}

fn urlencode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bare_state, peer, wired_state};
    use aim_core::config::AimConfig;
    use axum::extract::Path;

    #[tokio::test]
    async fn missing_attachment_is_not_found() {
        let mut config = AimConfig::default();
        config.non_prod = true;
        let response =
            handle_download(State(wired_state(config)), ConnectInfo(peer()), Path("missing".into()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn no_service_wired_is_unavailable() {
        let mut config = AimConfig::default();
        config.non_prod = true;
        let response =
            handle_download(State(bare_state(config)), ConnectInfo(peer()), Path("any".into()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn missing_token_with_auth_enforced_is_unauthorized() {
        let mut config = AimConfig::default();
        config.rpc_token = Some("secret".into());
        let response =
            handle_download(State(wired_state(config)), ConnectInfo(peer()), Path("any".into()), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn urlencode_escapes_reserved_bytes() {
        assert_eq!(urlencode("a b.txt"), "a%20b.txt");
        assert_eq!(urlencode("safe-_.~"), "safe-_.~");
    }
}

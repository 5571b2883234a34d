//! `GET /rpc/stream?cursor=<int>` notification stream (spec §4.9).

use crate::auth::extract_token;
use crate::cors::{apply_headers, is_allowed_origin};
use crate::state::AppState;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    cursor: u64,
}

pub async fn handle_stream(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Response {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    if let Some(origin) = origin {
        if !is_allowed_origin(origin, state.config.cors_allow_null_origin) {
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    let token = extract_token(&headers);
    if state.auth_enforced() {
        let required = state.config.rpc_token.as_deref().unwrap_or("");
        if token.as_deref() != Some(required) || required.is_empty() {
            return (StatusCode::UNAUTHORIZED, "missing or invalid rpc token").into_response();
        }
    }

    let Some(service) = state.service.clone() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "domain service is not wired").into_response();
    };

    let client_key = token.unwrap_or_else(|| peer.ip().to_string());
    let Some(slot) = state.stream_limiter.acquire(&client_key) else {
        let mut response = (StatusCode::TOO_MANY_REQUESTS, "subscription limit reached").into_response();
        response.headers_mut().insert("retry-after", axum::http::HeaderValue::from_static("1"));
        return response;
    };

    let (replay, receiver) = service.subscribe_notifications(query.cursor);
    let stream = build_event_stream(replay, receiver, slot);

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(20)).text("keepalive"))
        .into_response();
    apply_headers(response.headers_mut(), origin);
    response
}

fn build_event_stream(
    replay: Vec<aim_service::NotificationEvent>,
    receiver: tokio::sync::broadcast::Receiver<aim_service::NotificationEvent>,
    slot: aim_limits::StreamSlot,
) -> impl Stream<Item = Result<Event, Infallible>> {
    use tokio_stream::{wrappers::BroadcastStream, StreamExt};

    let replay_stream = futures::stream::iter(replay.into_iter().map(Ok));
    let live_stream = BroadcastStream::new(receiver).filter_map(|item| item.ok().map(Ok));

    async_stream::stream! {
        let _slot = slot;
        let mut combined = replay_stream.chain(live_stream);
        while let Some(Ok(event)) = combined.next().await {
            yield Ok(to_sse_event(&event));
        }
    }
}

fn to_sse_event(event: &aim_service::NotificationEvent) -> Event {
    let notification = serde_json::json!({
        "method": event.method,
        "params": {
            "version": 1,
            "seq": event.seq,
            "timestamp": event.timestamp,
            "payload": event.payload,
        },
    });
    Event::default().id(event.seq.to_string()).data(notification.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bare_state, peer, wired_state};
    use aim_core::config::AimConfig;
    use axum::extract::Query;

    #[tokio::test]
    async fn bare_state_without_service_is_unavailable() {
        let mut config = AimConfig::default();
        config.non_prod = true;
        let response =
            handle_stream(State(bare_state(config)), ConnectInfo(peer()), Query(StreamQuery { cursor: 0 }), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn wired_service_without_auth_requirement_streams_ok() {
        let mut config = AimConfig::default();
        config.non_prod = true;
        let response =
            handle_stream(State(wired_state(config)), ConnectInfo(peer()), Query(StreamQuery { cursor: 0 }), HeaderMap::new())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_with_auth_enforced_is_unauthorized() {
        let mut config = AimConfig::default();
        config.rpc_token = Some("secret".into());
        let response =
            handle_stream(State(wired_state(config)), ConnectInfo(peer()), Query(StreamQuery { cursor: 0 }), HeaderMap::new())
                .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn subscription_limit_of_zero_rejects_every_client() {
        let mut config = AimConfig::default();
        config.non_prod = true;
        config.stream_limits.max_global = 0;
        let response =
            handle_stream(State(wired_state(config)), ConnectInfo(peer()), Query(StreamQuery { cursor: 0 }), HeaderMap::new())
                .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

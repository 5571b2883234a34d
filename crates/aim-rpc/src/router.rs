//! Route wiring for the gateway's HTTP surface (spec §4.8 "HTTP surface").

use crate::files::handle_download;
use crate::handler::{handle_rpc, handle_rpc_preflight};
use crate::health::handle_health;
use crate::sse::handle_stream;
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc).options(handle_rpc_preflight))
        .route("/rpc/stream", get(handle_stream))
        .route("/healthz", get(handle_health))
        .route("/files/:id", get(handle_download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! `GET /healthz`: a liveness probe with no auth or rate limiting (spec §4.8
//! "HTTP surface").

use axum::response::Json;
use serde_json::{json, Value};

pub async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

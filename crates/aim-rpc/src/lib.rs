//! JSON-RPC-over-HTTP gateway: CORS, auth, rate limiting, idempotency,
//! method dispatch, and the SSE notification stream (spec §4.8, §4.9).

pub mod auth;
pub mod cors;
pub mod dispatch;
pub mod error_codes;
pub mod files;
pub mod handler;
pub mod health;
pub mod jsonrpc;
pub mod router;
pub mod sse;
pub mod state;
#[cfg(test)]
mod testing;

pub use router::build_router;
pub use state::AppState;

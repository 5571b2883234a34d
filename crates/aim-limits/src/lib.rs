//! Rate limiting, stream subscription caps, and the idempotency cache
//! shared across the RPC gateway.

pub mod idempotency;
pub mod rate_limiter;
pub mod stream_limiter;

pub use idempotency::{hash_request, IdempotencyCache, Lookup};
pub use rate_limiter::{RateLimitRule, RateLimiter};
pub use stream_limiter::{StreamLimiter, StreamSlot};

//! Shared gateway state: the wired `Service` (optional, per spec §4.8 step
//! 9), the process-wide limiters and idempotency cache, and the config the
//! dispatcher consults for feature flags and auth.

use aim_core::config::AimConfig;
use aim_core::time::Clock;
use aim_limits::{IdempotencyCache, RateLimiter, StreamLimiter};
use aim_service::Service;
use std::sync::Arc;

/// Everything an axum handler needs, cloned cheaply per request (every
/// field is an `Arc` or `Clone`-cheap handle).
#[derive(Clone)]
pub struct AppState {
    pub service: Option<Arc<dyn Service>>,
    pub config: Arc<AimConfig>,
    pub clock: Arc<dyn Clock>,
    pub rpc_rate_limiter: Arc<RateLimiter>,
    pub file_rate_limiter: Arc<RateLimiter>,
    pub idempotency: Arc<IdempotencyCache>,
    pub stream_limiter: StreamLimiter,
}

impl AppState {
    pub fn new(config: AimConfig, clock: Arc<dyn Clock>, service: Option<Arc<dyn Service>>) -> Self {
        let rpc_rate_limiter = Arc::new(RateLimiter::new(aim_limits::RateLimitRule {
            rps: config.rpc_rate_limit.rps,
            burst: config.rpc_rate_limit.burst,
        }));
        let file_rate_limiter = Arc::new(RateLimiter::new(aim_limits::RateLimitRule {
            rps: config.file_download_rate_limit.rps,
            burst: config.file_download_rate_limit.burst,
        }));
        let stream_limiter = StreamLimiter::new(config.stream_limits.max_global, config.stream_limits.max_per_client);
        Self {
            service,
            config: Arc::new(config),
            clock,
            rpc_rate_limiter,
            file_rate_limiter,
            idempotency: Arc::new(IdempotencyCache::new()),
            stream_limiter,
        }
    }

    /// Rate limiting and auth are bypassed only when the daemon is running
    /// under a "non-prod" marker (spec §6); fail-closed otherwise.
    pub fn rate_limiting_enabled(&self) -> bool {
        !self.config.non_prod
    }

    pub fn auth_enforced(&self) -> bool {
        self.config.rpc_token_required && !self.config.non_prod
    }
}

//! Sharded token-bucket rate limiter keyed by `token:<t>` or `ip:<host>`.

use aim_core::time::Clock;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

const IDLE_SWEEP_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: chrono::DateTime<chrono::Utc>,
    last_seen: chrono::DateTime<chrono::Utc>,
}

/// A single rate-limit rule: sustained rate plus burst capacity.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRule {
    pub rps: f64,
    pub burst: u32,
}

/// A sharded map of token buckets, one per limiter key, with idle eviction.
pub struct RateLimiter {
    rule: RateLimitRule,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(rule: RateLimitRule) -> Self {
        Self { rule, buckets: Mutex::new(HashMap::new()) }
    }

    /// Limiter key for a request: `token:<t>` if an auth token is present,
    /// otherwise `ip:<host>`.
    pub fn key_for(token: Option<&str>, remote_host: &str) -> String {
        match token {
            Some(t) if !t.is_empty() => format!("token:{t}"),
            _ => format!("ip:{remote_host}"),
        }
    }

    /// `true` iff a token is available for `key` at `now`; consumes one
    /// token on success. Also sweeps entries idle longer than the TTL.
    pub fn allow(&self, key: &str, clock: &dyn Clock) -> bool {
        let now = clock.now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        self.sweep(&mut buckets, now);

        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            tokens: self.rule.burst as f64,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed * self.rule.rps).min(self.rule.burst as f64);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            tracing::warn!(%key, "rate limit bucket exhausted");
            false
        }
    }

    fn sweep(&self, buckets: &mut HashMap<String, Bucket>, now: chrono::DateTime<chrono::Utc>) {
        let ttl = chrono::Duration::from_std(IDLE_SWEEP_TTL).expect("fixed duration");
        let before = buckets.len();
        buckets.retain(|_, bucket| now - bucket.last_seen < ttl);
        if buckets.len() != before {
            tracing::debug!(evicted = before - buckets.len(), "swept idle rate limit buckets");
        }
    }

    pub fn shard_count(&self) -> usize {
        self.buckets.lock().expect("rate limiter mutex poisoned").len()
    }
}

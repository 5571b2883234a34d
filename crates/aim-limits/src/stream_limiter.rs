//! Bounded SSE subscription counter: a global cap and a per-client cap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Inner {
    global_count: usize,
    per_client: HashMap<String, usize>,
}

/// Tracks active stream subscriptions against a global and a per-client
/// limit. `acquire` hands back a guard that releases both counters on drop;
/// exceeding either limit returns `None`.
#[derive(Clone)]
pub struct StreamLimiter {
    max_global: usize,
    max_per_client: usize,
    inner: Arc<Mutex<Inner>>,
}

impl StreamLimiter {
    pub fn new(max_global: usize, max_per_client: usize) -> Self {
        Self {
            max_global,
            max_per_client,
            inner: Arc::new(Mutex::new(Inner { global_count: 0, per_client: HashMap::new() })),
        }
    }

    /// Try to acquire a subscription slot for `client_key`.
    pub fn acquire(&self, client_key: &str) -> Option<StreamSlot> {
        let mut inner = self.inner.lock().expect("stream limiter mutex poisoned");
        if inner.global_count >= self.max_global {
            tracing::warn!(%client_key, "stream subscription denied: global cap reached");
            return None;
        }
        let per_client_count = inner.per_client.get(client_key).copied().unwrap_or(0);
        if per_client_count >= self.max_per_client {
            tracing::warn!(%client_key, "stream subscription denied: per-client cap reached");
            return None;
        }

        inner.global_count += 1;
        inner.per_client.insert(client_key.to_owned(), per_client_count + 1);
        drop(inner);

        Some(StreamSlot { inner: self.inner.clone(), client_key: client_key.to_owned() })
    }
}

/// Releases the acquired slot's counters when dropped.
pub struct StreamSlot {
    inner: Arc<Mutex<Inner>>,
    client_key: String,
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().expect("stream limiter mutex poisoned");
        inner.global_count = inner.global_count.saturating_sub(1);
        if let Some(count) = inner.per_client.get_mut(&self.client_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.per_client.remove(&self.client_key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_beyond_global_cap() {
        let limiter = StreamLimiter::new(1, 8);
        let _a = limiter.acquire("c1").unwrap();
        assert!(limiter.acquire("c2").is_none());
    }

    #[test]
    fn denies_beyond_per_client_cap() {
        let limiter = StreamLimiter::new(8, 1);
        let _a = limiter.acquire("c1").unwrap();
        assert!(limiter.acquire("c1").is_none());
    }

    #[test]
    fn release_frees_both_counters() {
        let limiter = StreamLimiter::new(1, 1);
        {
            let _slot = limiter.acquire("c1").unwrap();
            assert!(limiter.acquire("c1").is_none());
        }
        assert!(limiter.acquire("c1").is_some());
    }
}

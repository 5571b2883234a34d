//! Bounded, TTL'd cache for idempotency-key replay collapsing (spec §4.3,
//! §3 "IdempotencyEntry").
//!
//! Keyed by `auth_token ‖ "|" ‖ client_key`. A replay within the TTL window
//! with a matching request hash returns the original response; a matching
//! key with a different hash is a conflict the RPC layer must reject
//! rather than serve.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

const TTL_SECS: i64 = 10 * 60;
const MAX_ENTRIES: usize = 1_024;

#[derive(Debug, Clone)]
struct Entry {
    request_hash: String,
    response: serde_json::Value,
    created_at: DateTime<Utc>,
}

/// Outcome of an idempotency cache lookup.
pub enum Lookup {
    /// No entry exists for this key; the caller should process the request
    /// normally and call [`IdempotencyCache::set`] with the result.
    Miss,
    /// A prior response for this exact key and request hash is cached.
    Found(serde_json::Value),
    /// The key exists but the request hash differs from the cached entry.
    Conflict,
}

pub struct IdempotencyCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn cache_key(auth_token: &str, client_key: &str) -> String {
        format!("{auth_token}|{client_key}")
    }

    /// Look up `key`, pruning expired entries first.
    pub fn get(&self, key: &str, request_hash: &str, now: DateTime<Utc>) -> Lookup {
        let mut entries = self.entries.lock().expect("idempotency cache mutex poisoned");
        Self::prune(&mut entries, now);

        match entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if entry.request_hash == request_hash => Lookup::Found(entry.response.clone()),
            Some(_) => {
                tracing::warn!(%key, "idempotency key reused with a different request hash");
                Lookup::Conflict
            }
        }
    }

    /// Record a response for `key`. If this insert pushes the cache past
    /// its bound, the single oldest entry by `created_at` is evicted.
    pub fn set(&self, key: &str, request_hash: &str, response: serde_json::Value, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().expect("idempotency cache mutex poisoned");
        entries.insert(
            key.to_owned(),
            Entry { request_hash: request_hash.to_owned(), response, created_at: now },
        );

        if entries.len() > MAX_ENTRIES {
            if let Some(oldest_key) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest_key);
            }
        }
    }

    fn prune(entries: &mut HashMap<String, Entry>, now: DateTime<Utc>) {
        let ttl = Duration::seconds(TTL_SECS);
        entries.retain(|_, entry| now - entry.created_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("idempotency cache mutex poisoned").len()
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a request body to the stable digest used as the idempotency
/// conflict check's comparison key.
pub fn hash_request(body: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(body);
    hex::encode(digest)
}

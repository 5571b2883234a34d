//! Replay-window deduplication for inbound events and messages.
//!
//! A key is built from `kind|group_id|sender_device_id|unique_id`; a key is
//! accepted once per 30-minute window, and `occurred_at` must additionally
//! fall within `[now - 30m, now + 2m]` or the attempt is treated as
//! out-of-order rather than a replay.

use aim_core::errors::{AimError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

const WINDOW_PAST: i64 = 30 * 60;
const WINDOW_FUTURE_SKEW: i64 = 2 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayKind {
    Event,
    Message,
}

impl ReplayKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Message => "message",
        }
    }
}

/// Tracks recently-seen `(kind, group, device, unique_id)` tuples to reject
/// replays, pruning entries older than the window on every check.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    seen: HashMap<String, DateTime<Utc>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: ReplayKind, group_id: &str, sender_device_id: &str, unique_id: &str) -> String {
        format!("{}|{}|{}|{}", kind.as_str(), group_id, sender_device_id, unique_id)
    }

    /// Check and record a new admission. Returns `Ok(())` if this is the
    /// first time the tuple has been seen inside the window and
    /// `occurred_at` is within skew tolerance; otherwise returns the
    /// appropriate rejection.
    pub fn check_and_record(
        &mut self,
        kind: ReplayKind,
        group_id: &str,
        sender_device_id: &str,
        unique_id: &str,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.prune(now);

        let earliest = now - Duration::seconds(WINDOW_PAST);
        let latest = now + Duration::seconds(WINDOW_FUTURE_SKEW);
        if occurred_at < earliest || occurred_at > latest {
            return Err(AimError::out_of_order("occurred_at outside replay window"));
        }

        let key = Self::key(kind, group_id, sender_device_id, unique_id);
        if self.seen.contains_key(&key) {
            return Err(AimError::out_of_order("duplicate within replay window"));
        }

        self.seen.insert(key, now);
        Ok(())
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(WINDOW_PAST);
        self.seen.retain(|_, seen_at| *seen_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

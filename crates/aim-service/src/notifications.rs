//! Monotonic-sequence notification broadcaster feeding the SSE stream
//! (spec §3 "NotificationEvent", §4.9).

use aim_core::identifiers::GroupId;
use aim_core::time::Clock;
use aim_inbound::NotificationSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const REPLAY_BUFFER_LEN: usize = 256;
const CHANNEL_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub seq: u64,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Publishes notifications with a strictly increasing `seq`, keeps a bounded
/// replay buffer for clients reconnecting with a cursor, and fans them out
/// to live SSE subscribers over a broadcast channel.
pub struct NotificationBroadcaster {
    next_seq: AtomicU64,
    replay: Mutex<VecDeque<NotificationEvent>>,
    sender: broadcast::Sender<NotificationEvent>,
}

impl NotificationBroadcaster {
    pub fn new() -> Self {
        let (sender, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            next_seq: AtomicU64::new(1),
            replay: Mutex::new(VecDeque::with_capacity(REPLAY_BUFFER_LEN)),
            sender,
        }
    }

    pub fn publish(&self, clock: &dyn Clock, method: impl Into<String>, payload: serde_json::Value) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let event = NotificationEvent { seq, method: method.into(), timestamp: clock.now(), payload };

        {
            let mut replay = self.replay.lock().expect("notification replay buffer mutex poisoned");
            replay.push_back(event.clone());
            if replay.len() > REPLAY_BUFFER_LEN {
                replay.pop_front();
            }
        }

        // No subscribers is not an error; the event is still durable in the
        // replay buffer for whoever connects next.
        let _ = self.sender.send(event);
        seq
    }

    /// Events with `seq > cursor`, oldest first, still held in the replay
    /// buffer. Events older than the buffer's retention are simply gone;
    /// callers reconnecting past that point receive only what remains.
    pub fn replay_since(&self, cursor: u64) -> Vec<NotificationEvent> {
        self.replay
            .lock()
            .expect("notification replay buffer mutex poisoned")
            .iter()
            .filter(|event| event.seq > cursor)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter so the inbound orchestrator's plain notify calls land on the
/// broadcaster with the system clock; `aim-inbound`'s trait is intentionally
/// synchronous since it only needs to enqueue, not await delivery.
pub struct NotifySink<'a> {
    pub broadcaster: &'a NotificationBroadcaster,
    pub clock: &'a dyn Clock,
}

impl NotificationSink for NotifySink<'_> {
    fn notify_message(&self, group_id: &GroupId) {
        self.broadcaster.publish(
            self.clock,
            "notify.group.message.new",
            serde_json::json!({ "group_id": group_id.as_str() }),
        );
    }

    fn notify_group_updated(&self, group_id: &GroupId) {
        self.broadcaster.publish(
            self.clock,
            "notify.group.updated",
            serde_json::json!({ "group_id": group_id.as_str() }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::time::FixedClock;

    #[test]
    fn sequence_numbers_are_strictly_increasing() {
        let broadcaster = NotificationBroadcaster::new();
        let clock = FixedClock::new(Utc::now());

        let a = broadcaster.publish(&clock, "notify.test", serde_json::json!({}));
        let b = broadcaster.publish(&clock, "notify.test", serde_json::json!({}));
        assert!(b > a);
    }

    #[test]
    fn replay_since_excludes_already_seen_events() {
        let broadcaster = NotificationBroadcaster::new();
        let clock = FixedClock::new(Utc::now());

        let first = broadcaster.publish(&clock, "notify.test", serde_json::json!({"n": 1}));
        broadcaster.publish(&clock, "notify.test", serde_json::json!({"n": 2}));

        let replay = broadcaster.replay_since(first);
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].payload["n"], 2);
    }

    #[test]
    fn notify_sink_adapter_publishes_through_broadcaster() {
        let broadcaster = NotificationBroadcaster::new();
        let clock = FixedClock::new(Utc::now());
        let sink = NotifySink { broadcaster: &broadcaster, clock: &clock };

        sink.notify_group_updated(&GroupId::new("g1"));
        let replay = broadcaster.replay_since(0);
        assert_eq!(replay.len(), 1);
        assert_eq!(replay[0].method, "notify.group.updated");
    }
}

//! Append-only per-group event log, ordered for deterministic replay.

use crate::event::GroupEvent;
use aim_core::identifiers::EventId;
use std::collections::HashSet;

/// An ordered sequence of applied events plus an id index, so "has this
/// event already been folded" is O(1) without scanning the sequence.
#[derive(Debug, Clone, Default)]
pub struct GroupEventLog {
    events: Vec<GroupEvent>,
    applied_ids: HashSet<EventId>,
}

impl GroupEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if this event id has already been folded into the log.
    pub fn contains(&self, id: &EventId) -> bool {
        self.applied_ids.contains(id)
    }

    /// Append an event, keeping the `(version, occurred_at)` ordering.
    /// Callers are expected to have already checked [`Self::contains`].
    pub fn append(&mut self, event: GroupEvent) {
        self.applied_ids.insert(event.id.clone());
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupEvent> {
        self.events.iter()
    }

    /// A deep-copy snapshot suitable for apply-with-rollback restoration.
    pub fn snapshot(&self) -> GroupEventLogSnapshot {
        GroupEventLogSnapshot {
            events: self.events.clone(),
            applied_ids: self.applied_ids.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: GroupEventLogSnapshot) {
        self.events = snapshot.events;
        self.applied_ids = snapshot.applied_ids;
    }
}

/// A deep copy of a [`GroupEventLog`]'s state at a point in time.
#[derive(Debug, Clone)]
pub struct GroupEventLogSnapshot {
    events: Vec<GroupEvent>,
    applied_ids: HashSet<EventId>,
}

//! `GroupState`: the versioned, event-sourced membership state machine.

use crate::types::{Group, GroupMember, GroupRole, MemberStatus};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{EventId, MemberId};
use aim_journal::event::{GroupEvent, GroupEventKind, GroupEventPayload};
use aim_journal::log::{GroupEventLog, GroupEventLogSnapshot};
use std::collections::{HashMap, HashSet};

/// `{group, version, applied_event_ids, members, last_key_version}` per
/// spec §3 "GroupState", with its five cross-field invariants upheld by
/// construction: `version` always tracks the highest applied event,
/// `applied_event_ids` only grows through [`GroupState::apply`], every
/// member's `group_id` matches this state's group, `last_key_version`
/// never drops below 1 once set, and a `removed` member is never
/// resurrected without a fresh `member_add`.
#[derive(Debug, Clone)]
pub struct GroupState {
    pub group: Group,
    pub version: u64,
    applied_event_ids: HashSet<EventId>,
    pub members: HashMap<MemberId, GroupMember>,
    pub last_key_version: u64,
}

/// A deep-copy snapshot for apply-with-rollback.
#[derive(Debug, Clone)]
pub struct GroupStateSnapshot {
    version: u64,
    applied_event_ids: HashSet<EventId>,
    members: HashMap<MemberId, GroupMember>,
    last_key_version: u64,
    group: Group,
}

impl GroupState {
    pub fn new(group: Group) -> Self {
        Self {
            group,
            version: 0,
            applied_event_ids: HashSet::new(),
            members: HashMap::new(),
            last_key_version: 0,
        }
    }

    pub fn has_applied(&self, id: &EventId) -> bool {
        self.applied_event_ids.contains(id)
    }

    pub fn member(&self, member_id: &MemberId) -> Option<&GroupMember> {
        self.members.get(member_id)
    }

    pub fn is_active_member(&self, member_id: &MemberId) -> bool {
        self.members.get(member_id).is_some_and(|m| m.is_active())
    }

    fn snapshot(&self) -> GroupStateSnapshot {
        GroupStateSnapshot {
            version: self.version,
            applied_event_ids: self.applied_event_ids.clone(),
            members: self.members.clone(),
            last_key_version: self.last_key_version,
            group: self.group.clone(),
        }
    }

    fn restore(&mut self, snapshot: GroupStateSnapshot) {
        self.version = snapshot.version;
        self.applied_event_ids = snapshot.applied_event_ids;
        self.members = snapshot.members;
        self.last_key_version = snapshot.last_key_version;
        self.group = snapshot.group;
    }

    /// Validate an event's shape before it is applied (spec §4.5
    /// "Validation"). Does not check authorization or ordering.
    pub fn validate(event: &GroupEvent) -> Result<()> {
        if event.id.is_empty() {
            return Err(AimError::invalid("event id must not be empty"));
        }
        if event.group_id.is_empty() {
            return Err(AimError::invalid("group id must not be empty"));
        }
        if event.actor_id.is_empty() {
            return Err(AimError::invalid("actor id must not be empty"));
        }
        if event.version == 0 {
            return Err(AimError::invalid("event version must be non-zero"));
        }
        if event.occurred_at.timestamp() == 0 {
            return Err(AimError::invalid("occurred_at must be non-zero"));
        }

        match &event.payload {
            GroupEventPayload::MemberAdd { target_id, role } => {
                if target_id.is_empty() {
                    return Err(AimError::invalid("member_add requires a target id"));
                }
                if GroupRole::parse(role).is_none() {
                    return Err(AimError::invalid(format!("member_add: invalid role {role}")));
                }
            }
            GroupEventPayload::MemberRemove { target_id } | GroupEventPayload::MemberLeave { target_id } => {
                if target_id.is_empty() {
                    return Err(AimError::invalid("target id must not be empty"));
                }
            }
            GroupEventPayload::TitleChange { title } => {
                if title.trim().is_empty() {
                    return Err(AimError::invalid("title must not be empty"));
                }
            }
            GroupEventPayload::ProfileChange { .. } => {}
            GroupEventPayload::KeyRotate { key_version } => {
                if *key_version == 0 {
                    return Err(AimError::invalid("key_version must be >= 1"));
                }
            }
        }
        Ok(())
    }

    /// Apply a single validated event. Idempotent: re-applying an already
    /// folded event id is a no-op returning `Ok(false)`. A version that
    /// does not immediately follow the current one returns `OUT_OF_ORDER`.
    pub fn apply(&mut self, event: &GroupEvent) -> Result<bool> {
        if self.has_applied(&event.id) {
            return Ok(false);
        }
        if event.version != self.version + 1 {
            return Err(AimError::out_of_order(format!(
                "expected version {}, got {}",
                self.version + 1,
                event.version
            )));
        }

        match (&event.kind, &event.payload) {
            (GroupEventKind::MemberAdd, GroupEventPayload::MemberAdd { target_id, role }) => {
                self.apply_member_add(target_id, role, &event.actor_id, event.occurred_at);
            }
            (GroupEventKind::MemberRemove, GroupEventPayload::MemberRemove { target_id }) => {
                self.upsert_member_status(target_id, MemberStatus::Removed, event.occurred_at);
            }
            (GroupEventKind::MemberLeave, GroupEventPayload::MemberLeave { target_id }) => {
                self.upsert_member_status(target_id, MemberStatus::Left, event.occurred_at);
            }
            (GroupEventKind::TitleChange, GroupEventPayload::TitleChange { title }) => {
                self.group.title = title.clone();
                self.group.updated_at = event.occurred_at;
            }
            (GroupEventKind::ProfileChange, GroupEventPayload::ProfileChange { description, avatar }) => {
                if description.is_some() {
                    self.group.description = description.clone();
                }
                if avatar.is_some() {
                    self.group.avatar = avatar.clone();
                }
                self.group.updated_at = event.occurred_at;
            }
            (GroupEventKind::KeyRotate, GroupEventPayload::KeyRotate { key_version }) => {
                self.last_key_version = *key_version;
                self.group.updated_at = event.occurred_at;
            }
            _ => return Err(AimError::invalid("event kind and payload do not match")),
        }

        self.version = event.version;
        self.applied_event_ids.insert(event.id.clone());
        Ok(true)
    }

    fn apply_member_add(
        &mut self,
        target_id: &MemberId,
        role: &str,
        actor_id: &MemberId,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        let role = GroupRole::parse(role).unwrap_or(GroupRole::User);
        let group_id = self.group.id.clone();

        match self.members.get_mut(target_id) {
            Some(existing) => {
                let was_invited = matches!(existing.status, MemberStatus::Invited);
                let self_accept = actor_id == target_id && was_invited;
                let re_add = matches!(existing.status, MemberStatus::Left | MemberStatus::Removed);

                if self_accept {
                    existing.status = MemberStatus::Active;
                } else if re_add {
                    existing.status = MemberStatus::Invited;
                    existing.invited_at = now;
                }
                existing.role = role;
                existing.updated_at = now;
            }
            None => {
                self.members.insert(
                    target_id.clone(),
                    GroupMember {
                        group_id,
                        member_id: target_id.clone(),
                        role,
                        status: MemberStatus::Invited,
                        invited_at: now,
                        updated_at: now,
                    },
                );
            }
        }
    }

    fn upsert_member_status(
        &mut self,
        target_id: &MemberId,
        status: MemberStatus,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        let group_id = self.group.id.clone();
        match self.members.get_mut(target_id) {
            Some(existing) => {
                existing.status = status;
                existing.updated_at = now;
            }
            None => {
                self.members.insert(
                    target_id.clone(),
                    GroupMember {
                        group_id,
                        member_id: target_id.clone(),
                        role: GroupRole::User,
                        status,
                        invited_at: now,
                        updated_at: now,
                    },
                );
            }
        }
    }

    /// Apply a batch of events atomically against both this state and its
    /// event log: validate and apply each event in order; on any failure
    /// restore both to their pre-batch snapshots and return the error.
    /// Used by invite/remove/role-change paths that emit a membership
    /// event followed by a key-rotate.
    pub fn apply_with_rollback(&mut self, log: &mut GroupEventLog, events: &[GroupEvent]) -> Result<()> {
        let state_snapshot = self.snapshot();
        let log_snapshot = log.snapshot();

        if let Err(err) = self.apply_batch(log, events) {
            self.restore(state_snapshot);
            log.restore(log_snapshot);
            return Err(err);
        }
        Ok(())
    }

    fn apply_batch(&mut self, log: &mut GroupEventLog, events: &[GroupEvent]) -> Result<()> {
        for event in events {
            Self::validate(event)?;
            if self.apply(event)? {
                log.append(event.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::identifiers::GroupId;
    use chrono::Utc;

    fn group(id: &str) -> Group {
        let now = Utc::now();
        Group {
            id: GroupId::new(id),
            title: "General".into(),
            description: None,
            avatar: None,
            created_by: MemberId::new("owner"),
            created_at: now,
            updated_at: now,
        }
    }

    fn member_add(group_id: &str, version: u64, actor: &str, target: &str, role: &str) -> GroupEvent {
        GroupEvent {
            id: EventId::new(format!("e{version}")),
            group_id: GroupId::new(group_id),
            version,
            kind: GroupEventKind::MemberAdd,
            actor_id: MemberId::new(actor),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::MemberAdd {
                target_id: MemberId::new(target),
                role: role.into(),
            },
        }
    }

    #[test]
    fn apply_is_idempotent_on_repeated_event_id() {
        let mut state = GroupState::new(group("g1"));
        let event = member_add("g1", 1, "owner", "owner", "owner");

        assert!(state.apply(&event).unwrap());
        assert!(!state.apply(&event).unwrap());
        assert_eq!(state.version, 1);
    }

    #[test]
    fn rejects_out_of_order_version() {
        let mut state = GroupState::new(group("g1"));
        let event = member_add("g1", 2, "owner", "owner", "owner");
        let err = state.apply(&event).unwrap_err();
        assert!(matches!(err, AimError::OutOfOrder { .. }));
    }

    #[test]
    fn member_add_then_self_accept_transitions_to_active() {
        let mut state = GroupState::new(group("g1"));
        let invite = member_add("g1", 1, "owner", "m1", "user");
        state.apply(&invite).unwrap();
        assert_eq!(state.member(&MemberId::new("m1")).unwrap().status, MemberStatus::Invited);

        let accept = member_add("g1", 2, "m1", "m1", "user");
        state.apply(&accept).unwrap();
        assert_eq!(state.member(&MemberId::new("m1")).unwrap().status, MemberStatus::Active);
    }

    #[test]
    fn re_add_of_removed_member_resets_to_invited() {
        let mut state = GroupState::new(group("g1"));
        state.apply(&member_add("g1", 1, "owner", "m1", "user")).unwrap();

        let remove = GroupEvent {
            id: EventId::new("e2"),
            group_id: GroupId::new("g1"),
            version: 2,
            kind: GroupEventKind::MemberRemove,
            actor_id: MemberId::new("owner"),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::MemberRemove { target_id: MemberId::new("m1") },
        };
        state.apply(&remove).unwrap();
        assert_eq!(state.member(&MemberId::new("m1")).unwrap().status, MemberStatus::Removed);

        let re_add = member_add("g1", 3, "owner", "m1", "user");
        state.apply(&re_add).unwrap();
        assert_eq!(state.member(&MemberId::new("m1")).unwrap().status, MemberStatus::Invited);
    }

    #[test]
    fn apply_with_rollback_restores_state_and_log_on_failure() {
        let mut state = GroupState::new(group("g1"));
        let mut log = GroupEventLog::new();

        let good = member_add("g1", 1, "owner", "owner", "owner");
        let bad = member_add("g1", 3, "owner", "m2", "user"); // wrong version

        let err = state.apply_with_rollback(&mut log, &[good, bad]).unwrap_err();
        assert!(matches!(err, AimError::OutOfOrder { .. }));
        assert_eq!(state.version, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn validate_rejects_empty_title_change() {
        let event = GroupEvent {
            id: EventId::new("e1"),
            group_id: GroupId::new("g1"),
            version: 1,
            kind: GroupEventKind::TitleChange,
            actor_id: MemberId::new("owner"),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::TitleChange { title: "   ".into() },
        };
        assert!(GroupState::validate(&event).is_err());
    }
}

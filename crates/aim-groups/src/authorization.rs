//! Per-event-type inbound authorization (spec §4.5 "Authorization").

use crate::state::GroupState;
use crate::types::GroupRole;
use aim_core::errors::{AimError, Result};
use aim_journal::event::{GroupEvent, GroupEventKind, GroupEventPayload};

/// Authorize an inbound event against the current state, before it is
/// applied. The actor must exist and, except for self-membership events
/// (self-accept, self-leave), must be `active`.
pub fn authorize_event(state: &GroupState, event: &GroupEvent) -> Result<()> {
    let actor = state
        .member(&event.actor_id)
        .ok_or_else(|| AimError::permission_denied("actor is not a member of this group"))?;

    match (&event.kind, &event.payload) {
        (GroupEventKind::MemberAdd, GroupEventPayload::MemberAdd { target_id, role }) => {
            let self_accept = &event.actor_id == target_id;
            if !self_accept && !actor.is_active() {
                return Err(AimError::permission_denied("actor is not an active member"));
            }

            if self_accept {
                // Self-accept only moves an existing invited row to active;
                // it never creates a member or changes role.
                return Ok(());
            }

            if !matches!(actor.role, GroupRole::Owner | GroupRole::Admin) {
                return Err(AimError::permission_denied("member_add requires owner or admin"));
            }

            let requested_role = GroupRole::parse(role).unwrap_or(GroupRole::User);
            if requested_role == GroupRole::Owner {
                if let Some(target) = state.member(target_id) {
                    if target.role != GroupRole::Owner {
                        return Err(AimError::permission_denied("owner role is immutable"));
                    }
                } else {
                    return Err(AimError::permission_denied("owner role is immutable"));
                }
            }

            if let Some(target) = state.member(target_id) {
                if requested_role > target.role && actor.role != GroupRole::Owner {
                    return Err(AimError::permission_denied("role escalation requires owner"));
                }
            }
            Ok(())
        }
        (GroupEventKind::MemberRemove, GroupEventPayload::MemberRemove { target_id }) => {
            if !actor.is_active() {
                return Err(AimError::permission_denied("actor is not an active member"));
            }
            if !matches!(actor.role, GroupRole::Owner | GroupRole::Admin) {
                return Err(AimError::permission_denied("member_remove requires owner or admin"));
            }
            if let Some(target) = state.member(target_id) {
                if target.role == GroupRole::Owner {
                    return Err(AimError::permission_denied("owner is protected from removal"));
                }
                if actor.role == GroupRole::Admin && target.role == GroupRole::Admin {
                    return Err(AimError::permission_denied("admin cannot remove admin"));
                }
            }
            Ok(())
        }
        (GroupEventKind::MemberLeave, GroupEventPayload::MemberLeave { target_id }) => {
            if &event.actor_id != target_id {
                return Err(AimError::permission_denied("member_leave requires actor == target"));
            }
            Ok(())
        }
        (GroupEventKind::TitleChange, _) | (GroupEventKind::ProfileChange, _) => {
            if !actor.is_active() {
                return Err(AimError::permission_denied("actor is not an active member"));
            }
            if !matches!(actor.role, GroupRole::Owner | GroupRole::Admin) {
                return Err(AimError::permission_denied("requires owner or admin"));
            }
            Ok(())
        }
        (GroupEventKind::KeyRotate, _) => {
            if !actor.is_active() {
                return Err(AimError::permission_denied("actor is not an active member"));
            }
            if actor.role != GroupRole::Owner {
                return Err(AimError::permission_denied("key_rotate requires owner"));
            }
            Ok(())
        }
        _ => Err(AimError::invalid("event kind and payload do not match")),
    }
}

impl PartialOrd for GroupRole {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        fn rank(role: &GroupRole) -> u8 {
            match role {
                GroupRole::User => 0,
                GroupRole::Admin => 1,
                GroupRole::Owner => 2,
            }
        }
        rank(self).partial_cmp(&rank(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Group, GroupMember, MemberStatus};
    use aim_core::identifiers::{EventId, GroupId, MemberId};
    use chrono::Utc;

    fn state_with_members(members: Vec<(&str, GroupRole, MemberStatus)>) -> GroupState {
        let now = Utc::now();
        let mut state = GroupState::new(Group {
            id: GroupId::new("g1"),
            title: "General".into(),
            description: None,
            avatar: None,
            created_by: MemberId::new("owner"),
            created_at: now,
            updated_at: now,
        });
        for (id, role, status) in members {
            state.members.insert(
                MemberId::new(id),
                GroupMember {
                    group_id: GroupId::new("g1"),
                    member_id: MemberId::new(id),
                    role,
                    status,
                    invited_at: now,
                    updated_at: now,
                },
            );
        }
        state
    }

    fn remove_event(actor: &str, target: &str) -> GroupEvent {
        GroupEvent {
            id: EventId::new("e1"),
            group_id: GroupId::new("g1"),
            version: 1,
            kind: GroupEventKind::MemberRemove,
            actor_id: MemberId::new(actor),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::MemberRemove { target_id: MemberId::new(target) },
        }
    }

    #[test]
    fn admin_cannot_remove_admin() {
        let state = state_with_members(vec![
            ("a1", GroupRole::Admin, MemberStatus::Active),
            ("a2", GroupRole::Admin, MemberStatus::Active),
        ]);
        let err = authorize_event(&state, &remove_event("a1", "a2")).unwrap_err();
        assert!(matches!(err, AimError::PermissionDenied { .. }));
    }

    #[test]
    fn owner_target_is_protected_from_removal() {
        let state = state_with_members(vec![
            ("owner", GroupRole::Owner, MemberStatus::Active),
            ("admin", GroupRole::Admin, MemberStatus::Active),
        ]);
        let err = authorize_event(&state, &remove_event("admin", "owner")).unwrap_err();
        assert!(matches!(err, AimError::PermissionDenied { .. }));
    }

    #[test]
    fn only_self_may_leave() {
        let state = state_with_members(vec![("m1", GroupRole::User, MemberStatus::Active)]);
        let event = GroupEvent {
            id: EventId::new("e1"),
            group_id: GroupId::new("g1"),
            version: 1,
            kind: GroupEventKind::MemberLeave,
            actor_id: MemberId::new("m1"),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::MemberLeave { target_id: MemberId::new("other") },
        };
        let err = authorize_event(&state, &event).unwrap_err();
        assert!(matches!(err, AimError::PermissionDenied { .. }));
    }

    #[test]
    fn key_rotate_requires_owner() {
        let state = state_with_members(vec![("admin", GroupRole::Admin, MemberStatus::Active)]);
        let event = GroupEvent {
            id: EventId::new("e1"),
            group_id: GroupId::new("g1"),
            version: 1,
            kind: GroupEventKind::KeyRotate,
            actor_id: MemberId::new("admin"),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::KeyRotate { key_version: 2 },
        };
        let err = authorize_event(&state, &event).unwrap_err();
        assert!(matches!(err, AimError::PermissionDenied { .. }));
    }

    #[test]
    fn invited_member_may_self_accept() {
        let state = state_with_members(vec![("m1", GroupRole::User, MemberStatus::Invited)]);
        let event = GroupEvent {
            id: EventId::new("e1"),
            group_id: GroupId::new("g1"),
            version: 1,
            kind: GroupEventKind::MemberAdd,
            actor_id: MemberId::new("m1"),
            occurred_at: Utc::now(),
            payload: GroupEventPayload::MemberAdd { target_id: MemberId::new("m1"), role: "user".into() },
        };
        authorize_event(&state, &event).unwrap();
    }
}

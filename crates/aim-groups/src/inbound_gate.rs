//! Inbound message gate (spec §4.5): a pure check run before an inbound
//! group message is accepted into the fan-out/inbound pipeline.

use crate::state::GroupState;
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::MemberId;

/// Check an inbound wire message against membership and key-rotation
/// version expectations. Accepts only if the sender is an active member,
/// the wire's membership version matches the folded state version, and
/// the wire's group-key version matches `max(last_key_version, 1)`.
pub fn check_inbound_message(
    state: &GroupState,
    sender_id: &MemberId,
    wire_membership_version: u64,
    wire_group_key_version: u64,
) -> Result<()> {
    if !state.is_active_member(sender_id) {
        return Err(AimError::permission_denied("sender is not an active member"));
    }
    if wire_membership_version != state.version {
        return Err(AimError::out_of_order("MEMBERSHIP_VERSION_MISMATCH"));
    }
    let expected_key_version = state.last_key_version.max(1);
    if wire_group_key_version != expected_key_version {
        return Err(AimError::out_of_order("GROUP_KEY_VERSION_MISMATCH"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Group, GroupMember, GroupRole, MemberStatus};
    use aim_core::identifiers::GroupId;
    use chrono::Utc;

    fn active_state() -> GroupState {
        let now = Utc::now();
        let mut state = GroupState::new(Group {
            id: GroupId::new("g1"),
            title: "General".into(),
            description: None,
            avatar: None,
            created_by: MemberId::new("m1"),
            created_at: now,
            updated_at: now,
        });
        state.version = 3;
        state.last_key_version = 2;
        state.members.insert(
            MemberId::new("m1"),
            GroupMember {
                group_id: GroupId::new("g1"),
                member_id: MemberId::new("m1"),
                role: GroupRole::Owner,
                status: MemberStatus::Active,
                invited_at: now,
                updated_at: now,
            },
        );
        state
    }

    #[test]
    fn accepts_matching_versions() {
        let state = active_state();
        check_inbound_message(&state, &MemberId::new("m1"), 3, 2).unwrap();
    }

    #[test]
    fn rejects_non_member() {
        let state = active_state();
        let err = check_inbound_message(&state, &MemberId::new("stranger"), 3, 2).unwrap_err();
        assert!(matches!(err, AimError::PermissionDenied { .. }));
    }

    #[test]
    fn rejects_membership_version_mismatch() {
        let state = active_state();
        let err = check_inbound_message(&state, &MemberId::new("m1"), 2, 2).unwrap_err();
        assert!(matches!(err, AimError::OutOfOrder { .. }));
    }

    #[test]
    fn rejects_group_key_version_mismatch() {
        let state = active_state();
        let err = check_inbound_message(&state, &MemberId::new("m1"), 3, 1).unwrap_err();
        assert!(matches!(err, AimError::OutOfOrder { .. }));
    }
}

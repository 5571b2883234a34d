//! `HandleInboundGroupEvent` (spec §4.7).

use crate::collaborators::{BlockedCheck, DeviceGuard, GroupStateRepository, NotificationSink, ReplayGuardAccess};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{DeviceId, GroupId, MemberId};
use aim_core::time::Clock;
use aim_groups::authorization::authorize_event;
use aim_groups::state::GroupState;
use aim_groups::types::Group;
use aim_journal::{GroupEvent, GroupEventKind, GroupEventLog, GroupEventPayload, ReplayKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEventOutcome {
    Applied,
    Duplicate,
}

/// Apply a wire-decoded group event, or allow exactly one bootstrap case
/// (the first `member_add`, version 1, for a group the local identity has
/// never seen before).
pub async fn handle_inbound_group_event(
    event: GroupEvent,
    claimed_device_id: Option<DeviceId>,
    local_identity: &MemberId,
    clock: &dyn Clock,
    blocked_check: &dyn BlockedCheck,
    state_repo: &dyn GroupStateRepository,
    replay_guard: &dyn ReplayGuardAccess,
    device_guard: &dyn DeviceGuard,
    notifications: &dyn NotificationSink,
) -> Result<InboundEventOutcome> {
    let now = clock.now();

    if blocked_check.is_blocked(&event.actor_id).await? {
        return Err(AimError::policy_reject("blocked-sender"));
    }

    GroupState::validate(&event)?;

    if let Some(claimed) = &claimed_device_id {
        if !device_guard.matches_channel_meta(&event.actor_id, claimed).await? {
            return Err(AimError::permission_denied("device id does not match channel meta"));
        }
    }

    let device_key = claimed_device_id.as_ref().map(|d| d.as_str().to_owned()).unwrap_or_default();
    replay_guard.check_replay(ReplayKind::Event, event.group_id.as_str(), &device_key, event.id.as_str(), event.occurred_at, now)?;

    let loaded = state_repo.load(&event.group_id).await?;

    let (mut state, mut log) = match loaded {
        Some(pair) => pair,
        None => {
            if is_bootstrap_member_add(&event, local_identity) {
                (bootstrap_group_state(&event), GroupEventLog::new())
            } else {
                return Err(AimError::not_found("group does not exist"));
            }
        }
    };

    if state.has_applied(&event.id) {
        tracing::debug!(event_id = %event.id, "inbound event already applied, no-op");
        return Ok(InboundEventOutcome::Duplicate);
    }

    authorize_event(&state, &event)?;

    state.apply_with_rollback(&mut log, std::slice::from_ref(&event))?;

    state_repo.store(&event.group_id, state, log).await?;
    notifications.notify_group_updated(&event.group_id);

    Ok(InboundEventOutcome::Applied)
}

fn is_bootstrap_member_add(event: &GroupEvent, local_identity: &MemberId) -> bool {
    event.version == 1
        && matches!(event.kind, GroupEventKind::MemberAdd)
        && matches!(
            &event.payload,
            GroupEventPayload::MemberAdd { target_id, .. } if target_id == local_identity
        )
}

fn bootstrap_group_state(event: &GroupEvent) -> GroupState {
    GroupState::new(Group {
        id: event.group_id.clone(),
        title: String::new(),
        description: None,
        avatar: None,
        created_by: event.actor_id.clone(),
        created_at: event.occurred_at,
        updated_at: event.occurred_at,
    })
}

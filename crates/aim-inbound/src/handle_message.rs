//! `HandleInboundGroupMessage` (spec §4.7).

use crate::collaborators::{BlockedCheck, GroupStateRepository, NotificationSink, PayloadDecryptor, ReplayGuardAccess};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{ContactId, DeviceId, EventId, GroupId, MemberId, MessageId};
use aim_core::time::Clock;
use aim_fanout::message::{derive_message_id, FanoutMessage, MessageDirection, MessageStatus, CONTENT_TYPE_TEXT};
use aim_fanout::MessageStore;
use aim_groups::check_inbound_message;
use aim_journal::ReplayKind;
use chrono::{DateTime, Utc};

pub struct InboundMessageParams {
    pub sender_id: MemberId,
    pub sender_device_id: Option<DeviceId>,
    pub group_id: GroupId,
    pub event_id: EventId,
    pub membership_version: u64,
    pub group_key_version: u64,
    pub occurred_at: DateTime<Utc>,
    pub raw_payload: Vec<u8>,
}

/// Result of handling an inbound group message. `MESSAGE_ID_CONFLICT`
/// collapses to `Duplicate` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessageOutcome {
    Stored(MessageId),
    Duplicate(MessageId),
}

pub async fn handle_inbound_group_message(
    params: InboundMessageParams,
    clock: &dyn Clock,
    blocked_check: &dyn BlockedCheck,
    state_repo: &dyn GroupStateRepository,
    replay_guard: &dyn ReplayGuardAccess,
    decryptor: &dyn PayloadDecryptor,
    store: &dyn MessageStore,
    notifications: &dyn NotificationSink,
) -> Result<InboundMessageOutcome> {
    let now = clock.now();

    if blocked_check.is_blocked(&params.sender_id).await? {
        return Err(AimError::policy_reject("blocked-sender"));
    }

    let (state, _log) = state_repo
        .load(&params.group_id)
        .await?
        .ok_or_else(|| AimError::not_found("group does not exist"))?;

    check_inbound_message(&state, &params.sender_id, params.membership_version, params.group_key_version)?;

    let device_key = params.sender_device_id.as_ref().map(|d| d.as_str().to_owned()).unwrap_or_default();
    replay_guard.check_replay(
        ReplayKind::Message,
        params.group_id.as_str(),
        &device_key,
        params.event_id.as_str(),
        params.occurred_at,
        now,
    )?;

    let message_id = derive_message_id(&params.event_id, params.sender_id.as_str());
    if let Some(existing) = store.find(&message_id).await? {
        return Ok(InboundMessageOutcome::Duplicate(existing.id));
    }

    // Decryption failure degrades to storing the raw payload rather than
    // aborting; the plaintext is only used if it is available.
    let content = match decryptor.decrypt(&params.sender_id, &params.raw_payload).await {
        Ok(plaintext) => plaintext,
        Err(err) => {
            tracing::warn!(error = %err, "inbound message decrypt failed, storing raw payload");
            String::from_utf8_lossy(&params.raw_payload).into_owned()
        }
    };

    let message = FanoutMessage {
        id: message_id.clone(),
        contact_id: ContactId::new(params.sender_id.as_str()),
        conversation_id: params.group_id.clone(),
        conversation_type: "group".to_owned(),
        thread_id: None,
        content,
        timestamp: params.occurred_at,
        direction: MessageDirection::Inbound,
        status: MessageStatus::Delivered,
        content_type: CONTENT_TYPE_TEXT.to_owned(),
    };
    store.save(message).await?;
    notifications.notify_message(&params.group_id);

    Ok(InboundMessageOutcome::Stored(message_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::GroupStateRepository;
    use aim_core::time::FixedClock;
    use aim_groups::state::GroupState;
    use aim_groups::types::{Group, GroupMember, GroupRole, MemberStatus};
    use aim_journal::GroupEventLog;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct NeverBlocked;
    #[async_trait::async_trait]
    impl BlockedCheck for NeverBlocked {
        async fn is_blocked(&self, _member_id: &MemberId) -> Result<bool> {
            Ok(false)
        }
    }

    struct AlwaysBlocked;
    #[async_trait::async_trait]
    impl BlockedCheck for AlwaysBlocked {
        async fn is_blocked(&self, _member_id: &MemberId) -> Result<bool> {
            Ok(true)
        }
    }

    struct EchoDecryptor;
    #[async_trait::async_trait]
    impl PayloadDecryptor for EchoDecryptor {
        async fn decrypt(&self, _sender_id: &MemberId, raw_payload: &[u8]) -> Result<String> {
            Ok(String::from_utf8_lossy(raw_payload).into_owned())
        }
    }

    struct SingleGroupRepo(Mutex<Option<(GroupState, GroupEventLog)>>);
    #[async_trait::async_trait]
    impl GroupStateRepository for SingleGroupRepo {
        async fn load(&self, _group_id: &GroupId) -> Result<Option<(GroupState, GroupEventLog)>> {
            Ok(self.0.lock().unwrap().clone())
        }
        async fn store(&self, _group_id: &GroupId, state: GroupState, log: GroupEventLog) -> Result<()> {
            *self.0.lock().unwrap() = Some((state, log));
            Ok(())
        }
    }

    struct NullReplayGuard(Mutex<aim_journal::ReplayGuard>);
    impl ReplayGuardAccess for NullReplayGuard {
        fn check_replay(
            &self,
            kind: ReplayKind,
            group_id: &str,
            sender_device_id: &str,
            unique_id: &str,
            occurred_at: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<()> {
            self.0.lock().unwrap().check_and_record(kind, group_id, sender_device_id, unique_id, occurred_at, now)
        }
    }

    #[derive(Default)]
    struct InMemoryStore(Mutex<HashMap<String, FanoutMessage>>);
    #[async_trait::async_trait]
    impl MessageStore for InMemoryStore {
        async fn find(&self, id: &MessageId) -> Result<Option<FanoutMessage>> {
            Ok(self.0.lock().unwrap().get(id.as_str()).cloned())
        }
        async fn save(&self, message: FanoutMessage) -> Result<()> {
            self.0.lock().unwrap().insert(message.id.as_str().to_owned(), message);
            Ok(())
        }
        async fn list_for_conversation(&self, conversation_id: &GroupId) -> Result<Vec<FanoutMessage>> {
            Ok(self.0.lock().unwrap().values().filter(|m| &m.conversation_id == conversation_id).cloned().collect())
        }
    }

    struct NullNotifications;
    impl NotificationSink for NullNotifications {
        fn notify_message(&self, _group_id: &GroupId) {}
        fn notify_group_updated(&self, _group_id: &GroupId) {}
    }

    #[tokio::test]
    async fn blocked_sender_is_rejected() {
        let clock = FixedClock::new(Utc::now());
        let repo = SingleGroupRepo(Mutex::new(None));
        let guard = NullReplayGuard(Mutex::new(aim_journal::ReplayGuard::new()));
        let store = InMemoryStore::default();

        let params = InboundMessageParams {
            sender_id: MemberId::new("m1"),
            sender_device_id: Some(DeviceId::new("d1")),
            group_id: GroupId::new("g1"),
            event_id: EventId::new("gevtmsg_1"),
            membership_version: 1,
            group_key_version: 1,
            occurred_at: Utc::now(),
            raw_payload: b"hi".to_vec(),
        };

        let err = handle_inbound_group_message(
            params, &clock, &AlwaysBlocked, &repo, &guard, &EchoDecryptor, &store, &NullNotifications,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AimError::PolicyReject { .. }));
    }

    fn active_state_with_member() -> GroupState {
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
        state.version = 1;
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

    #[tokio::test]
    async fn accepted_message_is_stored_once_and_replays_collapse() {
        let clock = FixedClock::new(Utc::now());
        let repo = SingleGroupRepo(Mutex::new(Some((active_state_with_member(), GroupEventLog::new()))));
        let guard = NullReplayGuard(Mutex::new(aim_journal::ReplayGuard::new()));
        let store = InMemoryStore::default();

        let params = InboundMessageParams {
            sender_id: MemberId::new("m1"),
            sender_device_id: Some(DeviceId::new("d1")),
            group_id: GroupId::new("g1"),
            event_id: EventId::new("gevtmsg_1"),
            membership_version: 1,
            group_key_version: 1,
            occurred_at: Utc::now(),
            raw_payload: b"hi".to_vec(),
        };

        let outcome = handle_inbound_group_message(
            params, &clock, &NeverBlocked, &repo, &guard, &EchoDecryptor, &store, &NullNotifications,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, InboundMessageOutcome::Stored(_)));
    }
}

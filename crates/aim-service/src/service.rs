//! The `Service` facade: one capability interface composing the group
//! state machine, privacy policy engine, fan-out, and inbound orchestration
//! behind a single trait the RPC dispatcher consumes (spec §4.10).

use crate::capabilities::ServiceCapabilities;
use crate::collaborators::{AttachmentStore, ContactDirectory, ContactSummary, IdentityResolver, NetworkPublisher, SessionCrypto};
use crate::notifications::{NotificationBroadcaster, NotificationEvent, NotifySink};
use crate::registry::GroupRegistry;
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{ContactId, DeviceId, EventId, GroupId, MemberId, MessageId};
use aim_core::time::Clock;
use aim_fanout::message::{FanoutMessage, MessageDirection, MessageStatus, CONTENT_TYPE_TEXT};
use aim_fanout::{FanoutResult, MessagePublisher, MessageStore};
use aim_groups::authorization::authorize_event;
use aim_groups::state::GroupState;
use aim_groups::types::{Group, GroupRole};
use aim_inbound::{
    handle_inbound_group_event, handle_inbound_group_message, InboundEventOutcome, InboundMessageOutcome,
    InboundMessageParams,
};
use aim_journal::event::{GroupEvent, GroupEventKind, GroupEventPayload};
use aim_journal::ReplayGuard;
use aim_limits::{RateLimitRule, RateLimiter};
use aim_privacy::settings::{InboundMode, PrivacySettings, StorageProtection, ContentRetentionValue};
use aim_privacy::storage_resolution::{resolve_storage_policy as resolve_storage_policy_for, StorageScope};
use aim_privacy::{decide_inbound, Blocklist, RetentionPolicy, RoutingAction};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// The capability surface the RPC dispatcher consumes.
#[async_trait]
pub trait Service: Send + Sync {
    async fn whoami(&self) -> Result<MemberId>;

    async fn list_contacts(&self) -> Result<Vec<ContactSummary>>;
    async fn add_contact(&self, id: ContactId, display_name: String) -> Result<()>;
    async fn remove_contact(&self, id: ContactId) -> Result<()>;

    async fn upload_attachment(&self, bytes: Vec<u8>) -> Result<String>;
    async fn download_attachment(&self, id: String) -> Result<Option<Vec<u8>>>;
    async fn configure_attachment_replication(&self, attachment_id: String, acl_preset: String) -> Result<()>;

    async fn send_direct_message(&self, peer: ContactId, content: String) -> Result<MessageId>;
    async fn receive_direct_message(&self, peer: ContactId, ciphertext: Vec<u8>) -> Result<String>;

    async fn create_group(&self, title: String, creator: MemberId) -> Result<GroupId>;
    async fn invite_member(&self, group_id: GroupId, actor: MemberId, target: MemberId, role: String) -> Result<()>;
    async fn remove_member(&self, group_id: GroupId, actor: MemberId, target: MemberId) -> Result<()>;
    async fn leave_group(&self, group_id: GroupId, actor: MemberId) -> Result<()>;
    async fn rename_group(&self, group_id: GroupId, actor: MemberId, title: String) -> Result<()>;
    async fn rotate_group_key(&self, group_id: GroupId, actor: MemberId) -> Result<u64>;
    async fn send_group_message(
        &self,
        group_id: GroupId,
        content: String,
        thread_id: Option<String>,
    ) -> Result<FanoutResult>;
    async fn list_groups(&self) -> Result<Vec<GroupId>>;
    async fn group_snapshot(&self, group_id: GroupId) -> Result<GroupState>;
    /// User-visible message history for a group: fan-out transport shadows
    /// are filtered out (spec.md:303-305).
    async fn list_group_messages(&self, group_id: GroupId) -> Result<Vec<FanoutMessage>>;
    async fn apply_inbound_group_event(
        &self,
        event: GroupEvent,
        claimed_device_id: Option<DeviceId>,
    ) -> Result<InboundEventOutcome>;
    async fn apply_inbound_group_message(&self, params: InboundMessageParams) -> Result<InboundMessageOutcome>;

    async fn get_privacy_settings(&self) -> Result<PrivacySettings>;
    async fn set_inbound_mode(&self, mode: InboundMode) -> Result<()>;
    async fn block(&self, id: String) -> Result<()>;
    async fn unblock(&self, id: String) -> Result<()>;
    async fn list_blocked(&self) -> Result<Vec<String>>;
    async fn resolve_storage_policy(&self, scope: StorageScope, scope_id: String, pinned: bool) -> Result<RetentionPolicy>;

    async fn list_pending_requests(&self) -> Result<Vec<String>>;
    async fn accept_request(&self, sender_id: String, display_name: String) -> Result<()>;
    async fn reject_request(&self, sender_id: String) -> Result<()>;

    fn subscribe_notifications(&self, cursor: u64) -> (Vec<NotificationEvent>, broadcast::Receiver<NotificationEvent>);

    async fn start_network(&self) -> Result<()>;
    async fn stop_network(&self) -> Result<()>;

    fn capabilities(&self) -> ServiceCapabilities;
    async fn wipe_data(&self) -> Result<()>;
    async fn export_diagnostics(&self) -> Result<Vec<u8>>;
}

/// Concrete `Service` implementation, composing the lower engines behind
/// one read/write-locked group registry and per-concern mutexes, matching
/// the "each have their own mutex" rule of the concurrency model.
pub struct AimService {
    clock: Arc<dyn Clock>,
    identity: Arc<dyn IdentityResolver>,
    session_crypto: Arc<dyn SessionCrypto>,
    network: Arc<dyn NetworkPublisher>,
    attachments: Arc<dyn AttachmentStore>,
    contacts: Arc<dyn ContactDirectory>,
    group_publisher: Arc<dyn MessagePublisher>,
    message_store: Arc<dyn MessageStore>,

    registry: Arc<GroupRegistry>,
    notifications: NotificationBroadcaster,

    privacy: Mutex<PrivacySettings>,
    blocklist: Mutex<Blocklist>,
    replay_guard: Mutex<ReplayGuard>,
    known_devices: Mutex<HashMap<MemberId, DeviceId>>,
    pending_requests: Mutex<BTreeSet<String>>,

    send_rate_limiter: RateLimiter,
    invite_rate_limiter: RateLimiter,
}

impl AimService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityResolver>,
        session_crypto: Arc<dyn SessionCrypto>,
        network: Arc<dyn NetworkPublisher>,
        attachments: Arc<dyn AttachmentStore>,
        contacts: Arc<dyn ContactDirectory>,
        group_publisher: Arc<dyn MessagePublisher>,
        message_store: Arc<dyn MessageStore>,
        send_rate_limit: RateLimitRule,
        invite_rate_limit: RateLimitRule,
    ) -> Self {
        Self {
            clock,
            identity,
            session_crypto,
            network,
            attachments,
            contacts,
            group_publisher,
            message_store,
            registry: Arc::new(GroupRegistry::new()),
            notifications: NotificationBroadcaster::new(),
            privacy: Mutex::new(PrivacySettings::new(
                1,
                "everyone",
                StorageProtection::Standard,
                ContentRetentionValue::Ephemeral,
                0,
                None,
            )),
            blocklist: Mutex::new(Blocklist::new()),
            replay_guard: Mutex::new(ReplayGuard::new()),
            known_devices: Mutex::new(HashMap::new()),
            pending_requests: Mutex::new(BTreeSet::new()),
            send_rate_limiter: RateLimiter::new(send_rate_limit),
            invite_rate_limiter: RateLimiter::new(invite_rate_limit),
        }
    }

    fn notify_sink(&self) -> NotifySink<'_> {
        NotifySink { broadcaster: &self.notifications, clock: self.clock.as_ref() }
    }

    async fn load_for_mutation(&self, group_id: &GroupId) -> Result<(GroupState, aim_journal::GroupEventLog)> {
        self.registry
            .load(group_id)
            .await?
            .ok_or_else(|| AimError::not_found(format!("group {group_id} does not exist")))
    }

    async fn apply_local_event(&self, group_id: &GroupId, event: GroupEvent, bootstrap: bool) -> Result<()> {
        let (mut state, mut log) = if bootstrap {
            (GroupState::new(self.bootstrap_group(&event)), aim_journal::GroupEventLog::new())
        } else {
            self.load_for_mutation(group_id).await?
        };

        GroupState::validate(&event)?;
        if !bootstrap {
            authorize_event(&state, &event)?;
        }
        state.apply_with_rollback(&mut log, std::slice::from_ref(&event))?;
        tracing::debug!(
            group_id = %group_id.as_str(),
            event_id = %event.id.as_str(),
            kind = ?event.kind,
            version = state.version,
            "applied local group event"
        );
        self.registry.store(group_id, state, log).await?;
        self.notify_sink().notify_group_updated(group_id);
        Ok(())
    }

    fn bootstrap_group(&self, event: &GroupEvent) -> Group {
        let now = event.occurred_at;
        Group {
            id: event.group_id.clone(),
            title: String::new(),
            description: None,
            avatar: None,
            created_by: event.actor_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
impl aim_inbound::BlockedCheck for AimService {
    async fn is_blocked(&self, member_id: &MemberId) -> Result<bool> {
        Ok(self.blocklist.lock().expect("blocklist mutex poisoned").is_blocked(member_id.as_str()))
    }
}

#[async_trait]
impl aim_fanout::BlockedCheck for AimService {
    async fn is_blocked(&self, member_id: &MemberId) -> Result<bool> {
        Ok(self.blocklist.lock().expect("blocklist mutex poisoned").is_blocked(member_id.as_str()))
    }
}

impl aim_inbound::ReplayGuardAccess for AimService {
    fn check_replay(
        &self,
        kind: aim_journal::ReplayKind,
        group_id: &str,
        sender_device_id: &str,
        unique_id: &str,
        occurred_at: chrono::DateTime<chrono::Utc>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        self.replay_guard
            .lock()
            .expect("replay guard mutex poisoned")
            .check_and_record(kind, group_id, sender_device_id, unique_id, occurred_at, now)
    }
}

#[async_trait]
impl aim_inbound::DeviceGuard for AimService {
    /// First-seen trust: a sender's device id is recorded the first time it
    /// is observed and must match thereafter.
    async fn matches_channel_meta(&self, sender_id: &MemberId, claimed_device_id: &DeviceId) -> Result<bool> {
        let mut devices = self.known_devices.lock().expect("known devices mutex poisoned");
        match devices.get(sender_id) {
            Some(recorded) => Ok(recorded == claimed_device_id),
            None => {
                devices.insert(sender_id.clone(), claimed_device_id.clone());
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl aim_inbound::PayloadDecryptor for AimService {
    async fn decrypt(&self, sender_id: &MemberId, raw_payload: &[u8]) -> Result<String> {
        self.session_crypto.open(&ContactId::new(sender_id.as_str()), raw_payload).await
    }
}

#[async_trait]
impl aim_fanout::ActorResolver for AimService {
    async fn resolve_actor(&self) -> Result<(MemberId, DeviceId)> {
        Ok((self.identity.local_identity().await?, self.identity.local_device().await?))
    }
}

#[async_trait]
impl Service for AimService {
    async fn whoami(&self) -> Result<MemberId> {
        self.identity.local_identity().await
    }

    async fn list_contacts(&self) -> Result<Vec<ContactSummary>> {
        self.contacts.list().await
    }

    async fn add_contact(&self, id: ContactId, display_name: String) -> Result<()> {
        self.contacts.add(&id, &display_name).await
    }

    async fn remove_contact(&self, id: ContactId) -> Result<()> {
        self.contacts.remove(&id).await
    }

    async fn upload_attachment(&self, bytes: Vec<u8>) -> Result<String> {
        self.attachments.put(bytes).await
    }

    async fn download_attachment(&self, id: String) -> Result<Option<Vec<u8>>> {
        self.attachments.get(&id).await
    }

    async fn configure_attachment_replication(&self, _attachment_id: String, _acl_preset: String) -> Result<()> {
        Err(AimError::unsupported("blob pin/replication/ACL presets are not implemented by this service"))
    }

    async fn send_direct_message(&self, peer: ContactId, content: String) -> Result<MessageId> {
        if !self.contacts.is_known(&peer).await? {
            return Err(AimError::not_found("unknown contact"));
        }
        let ciphertext = self.session_crypto.seal(&peer, &content).await?;
        self.network.send_direct(&peer, &ciphertext).await?;

        let message_id = MessageId::generate();
        self.message_store
            .save(FanoutMessage {
                id: message_id.clone(),
                contact_id: peer,
                conversation_id: GroupId::new(""),
                conversation_type: "chat".to_owned(),
                thread_id: None,
                content,
                timestamp: self.clock.now(),
                direction: MessageDirection::Outbound,
                status: MessageStatus::Sent,
                content_type: CONTENT_TYPE_TEXT.to_owned(),
            })
            .await?;
        Ok(message_id)
    }

    async fn receive_direct_message(&self, peer: ContactId, ciphertext: Vec<u8>) -> Result<String> {
        if self.blocklist.lock().expect("blocklist mutex poisoned").is_blocked(peer.as_str()) {
            return Err(AimError::policy_reject("blocked-sender"));
        }
        let is_known_contact = self.contacts.is_known(&peer).await?;
        if !is_known_contact {
            match route_unknown_sender(self, peer.as_str(), false, false).await {
                RoutingAction::Reject => return Err(AimError::policy_reject("unknown-contacts-only")),
                RoutingAction::Queue => {
                    tracing::debug!(sender = %peer.as_str(), "inbound message from unknown sender queued as a request");
                    return Err(AimError::policy_reject("unknown-requests-mode"));
                }
                RoutingAction::Accept => {}
            }
        }
        self.session_crypto.open(&peer, &ciphertext).await
    }

    async fn create_group(&self, title: String, creator: MemberId) -> Result<GroupId> {
        let group_id = GroupId::generate();
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: 1,
            kind: GroupEventKind::MemberAdd,
            actor_id: creator.clone(),
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::MemberAdd { target_id: creator, role: GroupRole::Owner.as_str().to_owned() },
        };
        self.apply_local_event(&group_id, event, true).await?;

        if !title.trim().is_empty() {
            self.rename_group(group_id.clone(), self.whoami().await.unwrap_or_else(|_| MemberId::new("")), title)
                .await
                .ok();
        }
        Ok(group_id)
    }

    async fn invite_member(&self, group_id: GroupId, actor: MemberId, target: MemberId, role: String) -> Result<()> {
        if !self.invite_rate_limiter.allow(actor.as_str(), self.clock.as_ref()) {
            return Err(AimError::policy_reject("RateLimited"));
        }
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: state.version + 1,
            kind: GroupEventKind::MemberAdd,
            actor_id: actor,
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::MemberAdd { target_id: target, role },
        };
        self.apply_local_event(&group_id, event, false).await
    }

    async fn remove_member(&self, group_id: GroupId, actor: MemberId, target: MemberId) -> Result<()> {
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: state.version + 1,
            kind: GroupEventKind::MemberRemove,
            actor_id: actor,
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::MemberRemove { target_id: target },
        };
        self.apply_local_event(&group_id, event, false).await
    }

    async fn leave_group(&self, group_id: GroupId, actor: MemberId) -> Result<()> {
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: state.version + 1,
            kind: GroupEventKind::MemberLeave,
            actor_id: actor.clone(),
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::MemberLeave { target_id: actor },
        };
        self.apply_local_event(&group_id, event, false).await
    }

    async fn rename_group(&self, group_id: GroupId, actor: MemberId, title: String) -> Result<()> {
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: state.version + 1,
            kind: GroupEventKind::TitleChange,
            actor_id: actor,
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::TitleChange { title },
        };
        self.apply_local_event(&group_id, event, false).await
    }

    async fn rotate_group_key(&self, group_id: GroupId, actor: MemberId) -> Result<u64> {
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;
        let key_version = state.last_key_version + 1;
        let event = GroupEvent {
            id: EventId::generate(),
            group_id: group_id.clone(),
            version: state.version + 1,
            kind: GroupEventKind::KeyRotate,
            actor_id: actor,
            occurred_at: self.clock.now(),
            payload: GroupEventPayload::KeyRotate { key_version },
        };
        self.apply_local_event(&group_id, event, false).await?;
        Ok(key_version)
    }

    async fn send_group_message(
        &self,
        group_id: GroupId,
        content: String,
        thread_id: Option<String>,
    ) -> Result<FanoutResult> {
        let state = self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))?;

        let result = aim_fanout::send_group_message_fanout(
            &state,
            None,
            &content,
            thread_id,
            self.clock.as_ref(),
            self,
            self as &dyn aim_fanout::BlockedCheck,
            self.group_publisher.as_ref(),
            self.message_store.as_ref(),
            |actor_id| self.send_rate_limiter.allow(actor_id, self.clock.as_ref()),
        )
        .await?;

        self.notify_sink().notify_message(&group_id);
        Ok(result)
    }

    async fn list_groups(&self) -> Result<Vec<GroupId>> {
        Ok(self.registry.list_group_ids().await)
    }

    async fn group_snapshot(&self, group_id: GroupId) -> Result<GroupState> {
        self.registry.snapshot(&group_id).await.ok_or_else(|| AimError::not_found("group does not exist"))
    }

    async fn list_group_messages(&self, group_id: GroupId) -> Result<Vec<FanoutMessage>> {
        if !self.registry.exists(&group_id).await {
            return Err(AimError::not_found("group does not exist"));
        }
        let rows = self.message_store.list_for_conversation(&group_id).await?;
        Ok(aim_fanout::message::visible_history(rows))
    }

    async fn apply_inbound_group_event(
        &self,
        event: GroupEvent,
        claimed_device_id: Option<DeviceId>,
    ) -> Result<InboundEventOutcome> {
        let local_identity = self.identity.local_identity().await?;
        handle_inbound_group_event(
            event,
            claimed_device_id,
            &local_identity,
            self.clock.as_ref(),
            self as &dyn aim_inbound::BlockedCheck,
            self.registry.as_ref(),
            self,
            self,
            &self.notify_sink(),
        )
        .await
    }

    async fn apply_inbound_group_message(&self, params: InboundMessageParams) -> Result<InboundMessageOutcome> {
        handle_inbound_group_message(
            params,
            self.clock.as_ref(),
            self as &dyn aim_inbound::BlockedCheck,
            self.registry.as_ref(),
            self,
            self,
            self.message_store.as_ref(),
            &self.notify_sink(),
        )
        .await
    }

    async fn get_privacy_settings(&self) -> Result<PrivacySettings> {
        Ok(self.privacy.lock().expect("privacy mutex poisoned").clone())
    }

    async fn set_inbound_mode(&self, mode: InboundMode) -> Result<()> {
        self.privacy.lock().expect("privacy mutex poisoned").inbound_mode = mode;
        Ok(())
    }

    async fn block(&self, id: String) -> Result<()> {
        self.blocklist.lock().expect("blocklist mutex poisoned").block(&id)
    }

    async fn unblock(&self, id: String) -> Result<()> {
        self.blocklist.lock().expect("blocklist mutex poisoned").unblock(&id);
        Ok(())
    }

    async fn list_blocked(&self) -> Result<Vec<String>> {
        Ok(self.blocklist.lock().expect("blocklist mutex poisoned").list())
    }

    async fn resolve_storage_policy(&self, scope: StorageScope, scope_id: String, pinned: bool) -> Result<RetentionPolicy> {
        let settings = self.privacy.lock().expect("privacy mutex poisoned").clone();
        resolve_storage_policy_for(&settings, scope, &scope_id, pinned)
    }

    async fn list_pending_requests(&self) -> Result<Vec<String>> {
        Ok(self.pending_requests.lock().expect("pending requests mutex poisoned").iter().cloned().collect())
    }

    async fn accept_request(&self, sender_id: String, display_name: String) -> Result<()> {
        self.pending_requests.lock().expect("pending requests mutex poisoned").remove(&sender_id);
        self.contacts.add(&ContactId::new(sender_id), &display_name).await
    }

    async fn reject_request(&self, sender_id: String) -> Result<()> {
        self.pending_requests.lock().expect("pending requests mutex poisoned").remove(&sender_id);
        Ok(())
    }

    fn subscribe_notifications(&self, cursor: u64) -> (Vec<NotificationEvent>, broadcast::Receiver<NotificationEvent>) {
        (self.notifications.replay_since(cursor), self.notifications.subscribe())
    }

    async fn start_network(&self) -> Result<()> {
        self.network.start().await
    }

    async fn stop_network(&self) -> Result<()> {
        self.network.stop().await
    }

    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities::default()
    }

    async fn wipe_data(&self) -> Result<()> {
        Err(AimError::unsupported("data wipe is not implemented by this service"))
    }

    async fn export_diagnostics(&self) -> Result<Vec<u8>> {
        Err(AimError::unsupported("diagnostics export is not implemented by this service"))
    }
}

/// Records an inbound sender as queued when the current inbound mode
/// defers to the message-request inbox instead of auto-accepting.
pub async fn route_unknown_sender(
    service: &AimService,
    sender_id: &str,
    is_blocked: bool,
    is_known_contact: bool,
) -> RoutingAction {
    let mode = service.privacy.lock().expect("privacy mutex poisoned").inbound_mode;
    let decision = decide_inbound(is_blocked, is_known_contact, mode);
    if decision.action == RoutingAction::Queue {
        service.pending_requests.lock().expect("pending requests mutex poisoned").insert(sender_id.to_owned());
    }
    decision.action
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_core::time::FixedClock;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    struct FixedIdentity(MemberId, DeviceId);
    #[async_trait]
    impl IdentityResolver for FixedIdentity {
        async fn local_identity(&self) -> Result<MemberId> {
            Ok(self.0.clone())
        }
        async fn local_device(&self) -> Result<DeviceId> {
            Ok(self.1.clone())
        }
    }

    struct EchoSessionCrypto;
    #[async_trait]
    impl SessionCrypto for EchoSessionCrypto {
        async fn seal(&self, _peer: &ContactId, plaintext: &str) -> Result<Vec<u8>> {
            Ok(plaintext.as_bytes().to_vec())
        }
        async fn open(&self, _peer: &ContactId, ciphertext: &[u8]) -> Result<String> {
            Ok(String::from_utf8_lossy(ciphertext).into_owned())
        }
    }

    struct NullNetwork;
    #[async_trait]
    impl NetworkPublisher for NullNetwork {
        async fn start(&self) -> Result<()> {
            Ok(())
        }
        async fn stop(&self) -> Result<()> {
            Ok(())
        }
        async fn send_direct(&self, _peer: &ContactId, _ciphertext: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryAttachments(StdMutex<HashMap<String, Vec<u8>>>);
    #[async_trait]
    impl AttachmentStore for InMemoryAttachments {
        async fn put(&self, bytes: Vec<u8>) -> Result<String> {
            let id = format!("att_{}", self.0.lock().unwrap().len());
            self.0.lock().unwrap().insert(id.clone(), bytes);
            Ok(id)
        }
        async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }
    }

    #[derive(Default)]
    struct InMemoryContacts(StdMutex<HashMap<String, String>>);
    #[async_trait]
    impl ContactDirectory for InMemoryContacts {
        async fn is_known(&self, id: &ContactId) -> Result<bool> {
            Ok(self.0.lock().unwrap().contains_key(id.as_str()))
        }
        async fn list(&self) -> Result<Vec<ContactSummary>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .map(|(id, name)| ContactSummary { id: ContactId::new(id.clone()), display_name: name.clone() })
                .collect())
        }
        async fn add(&self, id: &ContactId, display_name: &str) -> Result<()> {
            self.0.lock().unwrap().insert(id.as_str().to_owned(), display_name.to_owned());
            Ok(())
        }
        async fn remove(&self, id: &ContactId) -> Result<()> {
            self.0.lock().unwrap().remove(id.as_str());
            Ok(())
        }
    }

    struct NoopPublisher;
    #[async_trait]
    impl MessagePublisher for NoopPublisher {
        async fn prepare_and_publish(
            &self,
            _content: &str,
            _recipient_id: &MemberId,
            _membership_version: u64,
            _group_key_version: u64,
            _sender_device_id: &DeviceId,
            _occurred_at: chrono::DateTime<Utc>,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryMessages(StdMutex<HashMap<String, FanoutMessage>>);
    #[async_trait]
    impl MessageStore for InMemoryMessages {
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

    fn test_service(local: &str) -> AimService {
        AimService::new(
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(FixedIdentity(MemberId::new(local), DeviceId::new("d1"))),
            Arc::new(EchoSessionCrypto),
            Arc::new(NullNetwork),
            Arc::new(InMemoryAttachments::default()),
            Arc::new(InMemoryContacts::default()),
            Arc::new(NoopPublisher),
            Arc::new(InMemoryMessages::default()),
            RateLimitRule { rps: 100.0, burst: 100 },
            RateLimitRule { rps: 100.0, burst: 100 },
        )
    }

    #[tokio::test]
    async fn create_group_bootstraps_owner_and_applies_title() {
        let service = test_service("owner");
        let group_id = service.create_group("General".into(), MemberId::new("owner")).await.unwrap();

        let state = service.group_snapshot(group_id).await.unwrap();
        assert_eq!(state.version, 2);
        assert_eq!(state.group.title, "General");
        assert!(state.is_active_member(&MemberId::new("owner")));
    }

    #[tokio::test]
    async fn invite_then_self_accept_activates_member() {
        let service = test_service("owner");
        let group_id = service.create_group("".into(), MemberId::new("owner")).await.unwrap();

        service
            .invite_member(group_id.clone(), MemberId::new("owner"), MemberId::new("m2"), "user".into())
            .await
            .unwrap();
        service
            .invite_member(group_id.clone(), MemberId::new("m2"), MemberId::new("m2"), "user".into())
            .await
            .unwrap();

        let state = service.group_snapshot(group_id).await.unwrap();
        assert!(state.is_active_member(&MemberId::new("m2")));
    }

    #[tokio::test]
    async fn send_group_message_notifies_and_returns_fanout_result() {
        let service = test_service("owner");
        let group_id = service.create_group("".into(), MemberId::new("owner")).await.unwrap();
        service
            .invite_member(group_id.clone(), MemberId::new("owner"), MemberId::new("m2"), "user".into())
            .await
            .unwrap();
        service
            .invite_member(group_id.clone(), MemberId::new("m2"), MemberId::new("m2"), "user".into())
            .await
            .unwrap();

        let result = service.send_group_message(group_id, "hi".into(), None).await.unwrap();
        assert_eq!(result.attempted, 1);
    }

    #[tokio::test]
    async fn unsupported_capability_returns_unsupported_error() {
        let service = test_service("owner");
        assert!(!service.capabilities().data_wipe);
        let err = service.wipe_data().await.unwrap_err();
        assert!(matches!(err, AimError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn blocked_sender_direct_message_is_rejected() {
        let service = test_service("owner");
        service.block("bad".into()).await.unwrap();
        let err = service.receive_direct_message(ContactId::new("bad"), b"hi".to_vec()).await.unwrap_err();
        assert!(matches!(err, AimError::PolicyReject { .. }));
    }

    #[tokio::test]
    async fn unknown_sender_in_requests_mode_is_queued_in_pending_requests() {
        let service = test_service("owner");
        service.set_inbound_mode(InboundMode::Requests).await.unwrap();

        let err = service.receive_direct_message(ContactId::new("stranger"), b"hi".to_vec()).await.unwrap_err();
        assert!(matches!(err, AimError::PolicyReject { .. }));

        let pending = service.list_pending_requests().await.unwrap();
        assert_eq!(pending, vec!["stranger".to_owned()]);
    }

    #[tokio::test]
    async fn unknown_sender_in_contacts_only_mode_is_rejected_without_queuing() {
        let service = test_service("owner");
        service.set_inbound_mode(InboundMode::ContactsOnly).await.unwrap();

        let err = service.receive_direct_message(ContactId::new("stranger"), b"hi".to_vec()).await.unwrap_err();
        assert!(matches!(err, AimError::PolicyReject { .. }));
        assert!(service.list_pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accepting_a_queued_request_adds_contact_and_clears_pending() {
        let service = test_service("owner");
        service.set_inbound_mode(InboundMode::Requests).await.unwrap();
        service.receive_direct_message(ContactId::new("stranger"), b"hi".to_vec()).await.unwrap_err();

        service.accept_request("stranger".into(), "Stranger".into()).await.unwrap();
        assert!(service.list_pending_requests().await.unwrap().is_empty());

        let contacts = service.list_contacts().await.unwrap();
        assert!(contacts.iter().any(|c| c.id.as_str() == "stranger"));
    }

    #[tokio::test]
    async fn notification_replay_reflects_group_updates() {
        let service = test_service("owner");
        service.create_group("".into(), MemberId::new("owner")).await.unwrap();

        let (replay, _rx) = service.subscribe_notifications(0);
        assert!(!replay.is_empty());
    }
}

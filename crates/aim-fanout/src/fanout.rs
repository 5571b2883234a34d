//! `SendGroupMessageFanout`: the full per-recipient delivery flow (spec
//! §4.6).

use crate::collaborators::{ActorResolver, BlockedCheck, MessagePublisher, MessageStore};
use crate::message::{
    derive_message_id, FanoutMessage, MessageDirection, MessageStatus, CONTENT_TYPE_GROUP_FANOUT_TRANSPORT,
    CONTENT_TYPE_TEXT,
};
use aim_core::errors::{AimError, Result};
use aim_core::identifiers::{ContactId, EventId, GroupId, MemberId};
use aim_core::time::Clock;
use aim_groups::state::GroupState;
use aim_groups::types::GroupRole;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Per-recipient outcome reported in a [`FanoutResult`].
#[derive(Debug, Clone)]
pub struct RecipientOutcome {
    pub recipient_id: MemberId,
    pub message_id: aim_core::identifiers::MessageId,
    pub status: MessageStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FanoutResult {
    pub group_id: GroupId,
    pub event_id: EventId,
    pub attempted: usize,
    pub delivered: usize,
    pub pending: usize,
    pub failed: usize,
    pub recipients: Vec<RecipientOutcome>,
}

/// Run the full send-fan-out flow against a snapshot of group state.
///
/// `state` must already reflect the current authoritative group state;
/// callers are expected to have taken whatever lock guards that snapshot.
pub async fn send_group_message_fanout(
    state: &GroupState,
    event_id: Option<EventId>,
    content: &str,
    thread_id: Option<String>,
    clock: &dyn Clock,
    actor_resolver: &dyn ActorResolver,
    blocked_check: &dyn BlockedCheck,
    publisher: &dyn MessagePublisher,
    store: &dyn MessageStore,
    send_rate_limit_allow: impl FnOnce(&str) -> bool,
) -> Result<FanoutResult> {
    if content.trim().is_empty() {
        return Err(AimError::invalid("InvalidContent"));
    }
    let event_id = event_id.unwrap_or_else(EventId::generate);

    let (actor_id, device_id) = actor_resolver.resolve_actor().await?;
    let now = clock.now();

    if !send_rate_limit_allow(actor_id.as_str()) {
        return Err(AimError::policy_reject("RateLimited"));
    }

    if !state.is_active_member(&actor_id) {
        return Err(AimError::permission_denied("actor is not an active member"));
    }
    if state.group.is_channel() {
        let actor = state.member(&actor_id).expect("checked active above");
        if !matches!(actor.role, GroupRole::Owner | GroupRole::Admin) {
            return Err(AimError::permission_denied("channel posting requires owner or admin"));
        }
    }

    let group_key_version = state.last_key_version.max(1);

    let mut recipients: Vec<MemberId> = Vec::new();
    for (member_id, member) in state.members.iter() {
        if member_id == &actor_id || !member.is_active() {
            continue;
        }
        if blocked_check.is_blocked(member_id).await? {
            continue;
        }
        recipients.push(member_id.clone());
    }
    shuffle_recipients(&mut recipients, &event_id);

    let sender_message_id = derive_message_id(&event_id, actor_id.as_str());
    persist_canonical_sender_message(
        store,
        &sender_message_id,
        &state.group.id,
        &actor_id,
        content,
        thread_id.clone(),
        now,
    )
    .await?;

    let mut outcomes = Vec::with_capacity(recipients.len());
    let mut delivered = 0usize;
    let mut pending = 0usize;
    let mut failed = 0usize;

    for recipient_id in &recipients {
        let message_id = derive_message_id(&event_id, recipient_id.as_str());

        if let Some(existing) = store.find(&message_id).await? {
            tally(&mut delivered, &mut pending, &mut failed, existing.status);
            outcomes.push(RecipientOutcome {
                recipient_id: recipient_id.clone(),
                message_id,
                status: existing.status,
                error: None,
            });
            continue;
        }

        let pending_row = FanoutMessage {
            id: message_id.clone(),
            contact_id: ContactId::new(recipient_id.as_str()),
            conversation_id: state.group.id.clone(),
            conversation_type: "group".to_owned(),
            thread_id: thread_id.clone(),
            content: content.to_owned(),
            timestamp: now,
            direction: MessageDirection::Outbound,
            status: MessageStatus::Pending,
            content_type: CONTENT_TYPE_GROUP_FANOUT_TRANSPORT.to_owned(),
        };
        store.save(pending_row).await?;

        match publisher
            .prepare_and_publish(content, recipient_id, state.version, group_key_version, &device_id, now)
            .await
        {
            Ok(()) => {
                let status = match store.find(&message_id).await? {
                    Some(row) => row.status,
                    None => MessageStatus::Pending,
                };
                tally(&mut delivered, &mut pending, &mut failed, status);
                outcomes.push(RecipientOutcome { recipient_id: recipient_id.clone(), message_id, status, error: None });
            }
            Err(err) => {
                failed += 1;
                if let Some(mut row) = store.find(&message_id).await? {
                    row.status = MessageStatus::Failed;
                    store.save(row).await?;
                }
                outcomes.push(RecipientOutcome {
                    recipient_id: recipient_id.clone(),
                    message_id,
                    status: MessageStatus::Failed,
                    error: Some(format!("{}", err.category() as u8)),
                });
            }
        }
    }

    tracing::info!(
        group_id = %state.group.id.as_str(),
        event_id = %event_id.as_str(),
        attempted = recipients.len(),
        delivered,
        pending,
        failed,
        "group message fan-out complete"
    );

    Ok(FanoutResult {
        group_id: state.group.id.clone(),
        event_id,
        attempted: recipients.len(),
        delivered,
        pending,
        failed,
        recipients: outcomes,
    })
}

fn tally(delivered: &mut usize, pending: &mut usize, failed: &mut usize, status: MessageStatus) {
    match status {
        MessageStatus::Sent | MessageStatus::Delivered => *delivered += 1,
        MessageStatus::Pending => *pending += 1,
        MessageStatus::Failed => *failed += 1,
    }
}

async fn persist_canonical_sender_message(
    store: &dyn MessageStore,
    message_id: &aim_core::identifiers::MessageId,
    group_id: &GroupId,
    actor_id: &MemberId,
    content: &str,
    thread_id: Option<String>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    if store.find(message_id).await?.is_some() {
        return Ok(());
    }
    store
        .save(FanoutMessage {
            id: message_id.clone(),
            contact_id: ContactId::new(actor_id.as_str()),
            conversation_id: group_id.clone(),
            conversation_type: "group".to_owned(),
            thread_id,
            content: content.to_owned(),
            timestamp: now,
            direction: MessageDirection::Outbound,
            status: MessageStatus::Sent,
            content_type: CONTENT_TYPE_TEXT.to_owned(),
        })
        .await
}

/// Shuffle recipients with a per-call RNG seeded from the event id, so
/// delivery order varies across sends but is reproducible for a given
/// event (useful for tests and for debugging a specific fan-out).
fn shuffle_recipients(recipients: &mut [MemberId], event_id: &EventId) {
    let digest = Sha256::digest(event_id.as_str().as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    let mut rng = ChaCha8Rng::from_seed(seed);
    recipients.shuffle(&mut rng);
}

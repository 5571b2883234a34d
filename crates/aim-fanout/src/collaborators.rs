//! Injected collaborators the fan-out engine depends on but does not own.

use crate::message::FanoutMessage;
use aim_core::errors::Result;
use aim_core::identifiers::{DeviceId, GroupId, MemberId, MessageId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Resolves the calling actor's identity and active device for a send.
#[async_trait]
pub trait ActorResolver: Send + Sync {
    async fn resolve_actor(&self) -> Result<(MemberId, DeviceId)>;
}

/// Publishes a prepared message to a single recipient over the transport
/// layer (out of scope here; see spec §1 "wire transport to peers").
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn prepare_and_publish(
        &self,
        content: &str,
        recipient_id: &MemberId,
        membership_version: u64,
        group_key_version: u64,
        sender_device_id: &DeviceId,
        occurred_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// `true` if `member_id` is currently blocked by the sending identity.
#[async_trait]
pub trait BlockedCheck: Send + Sync {
    async fn is_blocked(&self, member_id: &MemberId) -> Result<bool>;
}

/// Persists and re-reads the per-recipient message rows the fan-out
/// engine writes before and after attempting delivery.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// `Some(message)` if a row with this id already exists.
    async fn find(&self, id: &MessageId) -> Result<Option<FanoutMessage>>;
    async fn save(&self, message: FanoutMessage) -> Result<()>;
    /// All rows for a given conversation, in no particular order; callers
    /// that need user-visible history apply [`crate::message::visible_history`]
    /// to filter out fan-out transport shadows (spec.md:303-305).
    async fn list_for_conversation(&self, conversation_id: &GroupId) -> Result<Vec<FanoutMessage>>;
}

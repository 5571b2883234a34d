//! Injected collaborators for inbound message and event handling.

use aim_core::errors::Result;
use aim_core::identifiers::{DeviceId, GroupId, MemberId};
use aim_groups::state::GroupState;
use aim_journal::{GroupEventLog, ReplayKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Decrypts a raw inbound payload. Out of scope (spec §1): the X3DH +
/// ratchet handshake lives behind this seam.
#[async_trait]
pub trait PayloadDecryptor: Send + Sync {
    async fn decrypt(&self, sender_id: &MemberId, raw_payload: &[u8]) -> Result<String>;
}

/// Owns the group-state map and event log the inbound orchestrator folds
/// into; state and log are handed out and back in as a pair so the caller
/// can run apply-with-rollback against both together.
#[async_trait]
pub trait GroupStateRepository: Send + Sync {
    async fn load(&self, group_id: &GroupId) -> Result<Option<(GroupState, GroupEventLog)>>;
    async fn store(&self, group_id: &GroupId, state: GroupState, log: GroupEventLog) -> Result<()>;
}

/// `true` if `member_id` is currently blocked by the local identity.
#[async_trait]
pub trait BlockedCheck: Send + Sync {
    async fn is_blocked(&self, member_id: &MemberId) -> Result<bool>;
}

/// Shared, process-wide replay guard access, scoped to the single
/// check-and-record operation the inbound orchestrator needs so the seam
/// stays object-safe (no generic methods).
pub trait ReplayGuardAccess: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn check_replay(
        &self,
        kind: ReplayKind,
        group_id: &str,
        sender_device_id: &str,
        unique_id: &str,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

/// Notifies subscribers that a conversation or group was updated.
pub trait NotificationSink: Send + Sync {
    fn notify_message(&self, group_id: &GroupId);
    fn notify_group_updated(&self, group_id: &GroupId);
}

/// Resolves the device id claimed by an inbound envelope against the
/// local identity's record for that sender, for the device-match check
/// on inbound events.
#[async_trait]
pub trait DeviceGuard: Send + Sync {
    async fn matches_channel_meta(&self, sender_id: &MemberId, claimed_device_id: &DeviceId) -> Result<bool>;
}

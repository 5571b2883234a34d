//! The fan-out message row persisted per recipient (and for the sender's
//! own canonical copy), per spec §3 "Message (fan-out view)".

use aim_core::identifiers::{ContactId, EventId, GroupId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

/// The transport-shadow content type filtered out of user-visible history
/// (spec §4.6 closing note).
pub const CONTENT_TYPE_GROUP_FANOUT_TRANSPORT: &str = "group_fanout_transport";
pub const CONTENT_TYPE_TEXT: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutMessage {
    pub id: MessageId,
    pub contact_id: ContactId,
    pub conversation_id: GroupId,
    pub conversation_type: String,
    pub thread_id: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub direction: MessageDirection,
    pub status: MessageStatus,
    pub content_type: String,
}

/// Deterministically derive a per-recipient message id so retries
/// collapse onto the same row: `"gmsg_" ‖ hex(SHA-256(event_id ‖ "|" ‖
/// recipient_id)[:12])`.
pub fn derive_message_id(event_id: &EventId, recipient_id: &str) -> MessageId {
    let mut hasher = Sha256::new();
    hasher.update(event_id.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(recipient_id.as_bytes());
    let digest = hasher.finalize();
    MessageId::new(format!("gmsg_{}", hex::encode(&digest[..12])))
}

/// Filters a raw conversation read down to user-visible history: rows
/// tagged [`CONTENT_TYPE_GROUP_FANOUT_TRANSPORT`] are per-recipient
/// delivery shadows, never shown to the user (spec.md:303-305).
pub fn visible_history(mut rows: Vec<FanoutMessage>) -> Vec<FanoutMessage> {
    rows.retain(|row| row.content_type != CONTENT_TYPE_GROUP_FANOUT_TRANSPORT);
    rows.sort_by_key(|row| row.timestamp);
    rows
}

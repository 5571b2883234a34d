//! The group event envelope folded by the group state machine.

use aim_core::identifiers::{EventId, GroupId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single fact applied to a group's state, per spec §3 "GroupEvent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub id: EventId,
    pub group_id: GroupId,
    /// Strict monotonic counter per group, starting at 1.
    pub version: u64,
    pub kind: GroupEventKind,
    pub actor_id: MemberId,
    pub occurred_at: DateTime<Utc>,
    pub payload: GroupEventPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEventKind {
    MemberAdd,
    MemberRemove,
    MemberLeave,
    TitleChange,
    ProfileChange,
    KeyRotate,
}

impl GroupEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberAdd => "member_add",
            Self::MemberRemove => "member_remove",
            Self::MemberLeave => "member_leave",
            Self::TitleChange => "title_change",
            Self::ProfileChange => "profile_change",
            Self::KeyRotate => "key_rotate",
        }
    }
}

/// Type-specific fields carried by a [`GroupEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEventPayload {
    MemberAdd { target_id: MemberId, role: String },
    MemberRemove { target_id: MemberId },
    MemberLeave { target_id: MemberId },
    TitleChange { title: String },
    ProfileChange { description: Option<String>, avatar: Option<String> },
    KeyRotate { key_version: u64 },
}

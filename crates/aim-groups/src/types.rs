//! Group, member, and role data structures.

use aim_core::identifiers::{GroupId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Owner,
    Admin,
    User,
}

impl GroupRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Invited,
    Active,
    Left,
    Removed,
}

/// A group's title, optional description/avatar, and bookkeeping fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub title: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub created_by: MemberId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// `true` when the title begins with the `[channel:public]` or
    /// `[channel:private]` marker used to distinguish channels from plain
    /// groups (spec §4.6, GLOSSARY "Channel").
    pub fn is_channel(&self) -> bool {
        self.title.starts_with("[channel:public]") || self.title.starts_with("[channel:private]")
    }

    /// `true` when the channel marker specifies `private`.
    pub fn is_private_channel(&self) -> bool {
        self.title.starts_with("[channel:private]")
    }
}

/// `(group_id, member_id)` identity with role and status, per spec §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub role: GroupRole,
    pub status: MemberStatus,
    pub invited_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_active(&self) -> bool {
        matches!(self.status, MemberStatus::Active)
    }
}

//! `PrivacySettings`: inbound mode, storage protection, retention, and
//! scoped overrides, with the normalization rules applied on every
//! read and write (spec §3 "PrivacySettings").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundMode {
    ContactsOnly,
    Requests,
    Everyone,
}

impl InboundMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "contacts_only" => Some(Self::ContactsOnly),
            "requests" => Some(Self::Requests),
            "everyone" => Some(Self::Everyone),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProtection {
    Standard,
    Protected,
}

/// Per content-class TTL and quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetentionPolicy {
    pub retention: Option<ContentRetentionValue>,
    pub ttl_secs: u64,
    pub quota: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRetentionValue {
    Persistent,
    Ephemeral,
    ZeroRetention,
}

impl Default for ContentRetentionValue {
    fn default() -> Self {
        Self::Ephemeral
    }
}

const DEFAULT_EPHEMERAL_TTL_SECS: u64 = 86_400;

/// A scoped override: `override.resolve(pinned)` per spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOverride {
    pub retention: ContentRetentionValue,
    pub ttl_secs: u64,
    pub quota: Option<u64>,
    /// `true` when this override is an infinite-TTL override that requires
    /// the resolved artifact to be pinned before it is honored.
    pub requires_pinned: bool,
}

impl StorageOverride {
    /// Resolve this override for an artifact that is (or is not) pinned.
    /// An infinite-TTL ("requires_pinned") override on a non-pinned
    /// artifact fails closed.
    pub fn resolve(&self, pinned: bool) -> Result<RetentionPolicy, super::InfiniteTtlRequiresPinned> {
        if self.requires_pinned && !pinned {
            return Err(super::InfiniteTtlRequiresPinned);
        }
        Ok(normalize_retention(self.retention, self.ttl_secs, self.quota))
    }
}

/// Apply the three normalization rules from spec §3 to a raw retention
/// triple, regardless of whether it came from a user default or override.
pub fn normalize_retention(
    retention: ContentRetentionValue,
    ttl_secs: u64,
    quota: Option<u64>,
) -> RetentionPolicy {
    let ttl_secs = match retention {
        ContentRetentionValue::ZeroRetention | ContentRetentionValue::Persistent => 0,
        ContentRetentionValue::Ephemeral if ttl_secs == 0 => DEFAULT_EPHEMERAL_TTL_SECS,
        ContentRetentionValue::Ephemeral => ttl_secs,
    };
    RetentionPolicy { retention: Some(retention), ttl_secs, quota }
}

/// Full settings record, normalized on construction and on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub schema_version: u32,
    pub inbound_mode: InboundMode,
    pub storage_protection: StorageProtection,
    pub default_retention: RetentionPolicy,
    pub scoped_overrides: HashMap<String, StorageOverride>,
    pub node_policies: HashMap<String, String>,
}

impl PrivacySettings {
    /// Construct settings, applying normalization to any raw inbound mode
    /// string (invalid modes default to `everyone`) and the default
    /// retention policy.
    pub fn new(
        schema_version: u32,
        raw_inbound_mode: &str,
        storage_protection: StorageProtection,
        retention: ContentRetentionValue,
        ttl_secs: u64,
        quota: Option<u64>,
    ) -> Self {
        let inbound_mode = InboundMode::parse(raw_inbound_mode).unwrap_or(InboundMode::Everyone);
        Self {
            schema_version,
            inbound_mode,
            storage_protection,
            default_retention: normalize_retention(retention, ttl_secs, quota),
            scoped_overrides: HashMap::new(),
            node_policies: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_mode_defaults_to_everyone() {
        let settings = PrivacySettings::new(
            1,
            "bogus",
            StorageProtection::Standard,
            ContentRetentionValue::Ephemeral,
            0,
            None,
        );
        assert_eq!(settings.inbound_mode, InboundMode::Everyone);
    }

    #[test]
    fn zero_retention_forces_ttl_zero() {
        let policy = normalize_retention(ContentRetentionValue::ZeroRetention, 500, None);
        assert_eq!(policy.ttl_secs, 0);
    }

    #[test]
    fn persistent_forces_ttl_zero() {
        let policy = normalize_retention(ContentRetentionValue::Persistent, 999, Some(10));
        assert_eq!(policy.ttl_secs, 0);
    }

    #[test]
    fn ephemeral_zero_ttl_gets_default() {
        let policy = normalize_retention(ContentRetentionValue::Ephemeral, 0, None);
        assert_eq!(policy.ttl_secs, DEFAULT_EPHEMERAL_TTL_SECS);
    }

    #[test]
    fn infinite_ttl_override_requires_pin() {
        let over = StorageOverride {
            retention: ContentRetentionValue::Persistent,
            ttl_secs: 0,
            quota: None,
            requires_pinned: true,
        };
        assert!(over.resolve(false).is_err());
        assert!(over.resolve(true).is_ok());
    }
}

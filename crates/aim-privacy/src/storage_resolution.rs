//! Scoped storage-retention policy resolution (spec §4.4 "Scoped storage
//! resolution").

use crate::settings::{normalize_retention, PrivacySettings, RetentionPolicy};
use crate::InfiniteTtlRequiresPinned;
use aim_core::errors::{AimError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    Global,
    Group,
    Channel,
    Chat,
}

impl StorageScope {
    fn lookup_key(self, scope_id: &str) -> Result<String> {
        match self {
            StorageScope::Global => Ok("global".to_owned()),
            _ if scope_id.is_empty() => Err(AimError::invalid("scope_id is required for a non-global scope")),
            StorageScope::Group => Ok(format!("group:{scope_id}")),
            StorageScope::Channel => Ok(format!("channel:{scope_id}")),
            StorageScope::Chat => Ok(format!("chat:{scope_id}")),
        }
    }
}

/// Resolve the effective retention policy for `(scope, scope_id)`. Falls
/// back to the user's default policy (re-normalized) when no override is
/// registered at the computed lookup key.
pub fn resolve_storage_policy(
    settings: &PrivacySettings,
    scope: StorageScope,
    scope_id: &str,
    pinned: bool,
) -> Result<RetentionPolicy> {
    let key = scope.lookup_key(scope_id)?;

    if let Some(over) = settings.scoped_overrides.get(&key) {
        return over.resolve(pinned).map_err(|InfiniteTtlRequiresPinned| {
            AimError::policy_reject("ErrInfiniteTTLRequiresPinned")
        });
    }

    let default = settings.default_retention;
    Ok(normalize_retention(
        default.retention.unwrap_or(crate::settings::ContentRetentionValue::Ephemeral),
        default.ttl_secs,
        default.quota,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{ContentRetentionValue, StorageOverride, StorageProtection};

    fn base_settings() -> PrivacySettings {
        PrivacySettings::new(1, "everyone", StorageProtection::Standard, ContentRetentionValue::Ephemeral, 0, None)
    }

    #[test]
    fn global_scope_needs_no_scope_id() {
        let settings = base_settings();
        let policy = resolve_storage_policy(&settings, StorageScope::Global, "", false).unwrap();
        assert_eq!(policy.ttl_secs, 86_400);
    }

    #[test]
    fn non_global_scope_requires_scope_id() {
        let settings = base_settings();
        let err = resolve_storage_policy(&settings, StorageScope::Group, "", false).unwrap_err();
        assert!(matches!(err, AimError::Invalid { .. }));
    }

    #[test]
    fn override_without_pin_fails_closed_on_infinite_ttl() {
        let mut settings = base_settings();
        settings.scoped_overrides.insert(
            "group:g1".to_owned(),
            StorageOverride {
                retention: ContentRetentionValue::Persistent,
                ttl_secs: 0,
                quota: None,
                requires_pinned: true,
            },
        );

        let err = resolve_storage_policy(&settings, StorageScope::Group, "g1", false).unwrap_err();
        assert!(matches!(err, AimError::PolicyReject { .. }));

        let ok = resolve_storage_policy(&settings, StorageScope::Group, "g1", true).unwrap();
        assert_eq!(ok.ttl_secs, 0);
    }
}

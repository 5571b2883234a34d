//! Privacy policy engine: inbound routing decisions and scoped
//! storage-retention policy resolution.

pub mod blocklist;
pub mod routing;
pub mod settings;
pub mod storage_resolution;

pub use blocklist::Blocklist;
pub use routing::{decide_inbound, decide_invite, InviteAction, RoutingAction, RoutingDecision};
pub use settings::{
    ContentRetentionValue, InboundMode, PrivacySettings, RetentionPolicy, StorageOverride,
    StorageProtection,
};
pub use storage_resolution::{resolve_storage_policy, StorageScope};

/// An infinite-TTL override was resolved for an artifact that is not
/// pinned; the caller must map this to `ErrInfiniteTTLRequiresPinned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("infinite-TTL override requires a pinned artifact")]
pub struct InfiniteTtlRequiresPinned;

//! Optional-capability probing (spec §4.10, §9).
//!
//! Rather than downcasting trait objects, the facade exposes a single
//! predicate record the dispatcher consults before routing to an optional
//! method; a `false` flag maps straight to that method's dedicated
//! unsupported error code.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceCapabilities {
    pub data_wipe: bool,
    pub diagnostics_export: bool,
    pub blob_pin_replication_acl: bool,
    pub node_binding: bool,
}

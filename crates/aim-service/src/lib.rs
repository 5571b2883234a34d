//! The `Service` façade composing the group state machine, privacy engine,
//! fan-out, and inbound orchestration behind one capability interface the
//! RPC dispatcher consumes (spec §4.10).

pub mod capabilities;
pub mod collaborators;
pub mod notifications;
pub mod registry;
pub mod service;

pub use capabilities::ServiceCapabilities;
pub use collaborators::{AttachmentStore, ContactDirectory, ContactSummary, IdentityResolver, NetworkPublisher, SessionCrypto};
pub use notifications::{NotificationBroadcaster, NotificationEvent, NotifySink};
pub use registry::GroupRegistry;
pub use service::{AimService, Service};

//! Inbound orchestration for group messages and group events: the two
//! entry points a transport adapter calls once a wire payload has been
//! received and its envelope opened (spec §4.7).

pub mod collaborators;
pub mod handle_event;
pub mod handle_message;

pub use collaborators::{BlockedCheck, DeviceGuard, GroupStateRepository, NotificationSink, PayloadDecryptor, ReplayGuardAccess};
pub use handle_event::{handle_inbound_group_event, InboundEventOutcome};
pub use handle_message::{handle_inbound_group_message, InboundMessageOutcome, InboundMessageParams};

//! Deterministic per-recipient group-message fan-out.

pub mod collaborators;
pub mod fanout;
pub mod message;

pub use collaborators::{ActorResolver, BlockedCheck, MessagePublisher, MessageStore};
pub use fanout::{send_group_message_fanout, FanoutResult, RecipientOutcome};
pub use message::{derive_message_id, FanoutMessage, MessageDirection, MessageStatus};

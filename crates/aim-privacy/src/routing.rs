//! Pure inbound-routing decision table (spec §4.4).

use crate::settings::InboundMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingAction {
    Accept,
    Reject,
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingDecision {
    pub action: RoutingAction,
    pub reason: &'static str,
}

/// Decide how to route an inbound message given whether the sender is
/// blocked, a known contact, and the receiver's inbound mode.
pub fn decide_inbound(is_blocked: bool, is_known_contact: bool, mode: InboundMode) -> RoutingDecision {
    if is_blocked {
        return RoutingDecision { action: RoutingAction::Reject, reason: "blocked-sender" };
    }
    if is_known_contact {
        return RoutingDecision { action: RoutingAction::Accept, reason: "trusted-contact" };
    }
    match mode {
        InboundMode::ContactsOnly => {
            RoutingDecision { action: RoutingAction::Reject, reason: "unknown-contacts-only" }
        }
        InboundMode::Requests => {
            RoutingDecision { action: RoutingAction::Queue, reason: "unknown-requests-mode" }
        }
        InboundMode::Everyone => {
            RoutingDecision { action: RoutingAction::Accept, reason: "unknown-everyone-mode" }
        }
    }
}

/// `true` if an unknown sender in `everyone` mode without a conversation
/// scope and without an existing contact card should be auto-added as a
/// contact. Group invitations never qualify (`is_group_conversation`).
pub fn should_auto_add_contact(
    is_blocked: bool,
    is_known_contact: bool,
    mode: InboundMode,
    is_group_conversation: bool,
    has_contact_card: bool,
) -> bool {
    !is_blocked
        && !is_known_contact
        && mode == InboundMode::Everyone
        && !is_group_conversation
        && !has_contact_card
}

/// `true` if strict inbound device authentication may be bypassed for this
/// sender — same conditions as [`should_auto_add_contact`].
pub fn should_bypass_device_auth(
    is_blocked: bool,
    is_known_contact: bool,
    mode: InboundMode,
    is_group_conversation: bool,
    has_contact_card: bool,
) -> bool {
    should_auto_add_contact(is_blocked, is_known_contact, mode, is_group_conversation, has_contact_card)
}

/// Group-invitation variant of [`decide_inbound`]: `accept` becomes
/// `accept-invite` and `queue` becomes `queue-request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteAction {
    AcceptInvite,
    Reject,
    QueueRequest,
}

pub fn decide_invite(is_blocked: bool, is_known_contact: bool, mode: InboundMode) -> InviteAction {
    match decide_inbound(is_blocked, is_known_contact, mode).action {
        RoutingAction::Accept => InviteAction::AcceptInvite,
        RoutingAction::Reject => InviteAction::Reject,
        RoutingAction::Queue => InviteAction::QueueRequest,
    }
}

//! Membership change kinds reported by the project store.

use serde::{Deserialize, Serialize};

use crate::shared::event::EventType;

/// Authorization-changing operation committed by a project handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    /// An owner or admin removed a member
    MemberRemoved,
    /// A member left voluntarily
    MemberLeft,
    /// Project ownership moved to another member
    OwnerTransferred,
    /// A member's admin flag was toggled
    AdminUpdated,
    /// A user joined through an invite code
    MemberJoined,
}

impl MembershipChange {
    /// Whether the affected identities lose access to the room
    pub fn revokes_access(&self) -> bool {
        matches!(self, Self::MemberRemoved | Self::MemberLeft)
    }

    /// Room-scoped notice broadcast for this change
    pub fn notice_event(&self) -> EventType {
        match self {
            Self::MemberRemoved => EventType::MemberRemoved,
            Self::MemberLeft => EventType::MemberLeft,
            Self::OwnerTransferred => EventType::OwnerTransferred,
            Self::AdminUpdated => EventType::AdminUpdated,
            Self::MemberJoined => EventType::MemberJoined,
        }
    }
}

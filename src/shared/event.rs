/**
 * Real-time Event System
 *
 * This module defines the event vocabulary shared by the server fan-out and
 * the client session. Wire names are stable; clients subscribe by name.
 *
 * # Envelope
 *
 * Every frame pushed to a connection is a JSON envelope:
 *
 * ```json
 * {
 *   "event": "task:created",
 *   "data": {"_id": "t1", "text": "Write docs"},
 *   "room": "65f1c0ffee",
 *   "timestamp": "2024-03-01T12:00:00Z"
 * }
 * ```
 *
 * # Client Commands
 *
 * Clients send `joinProject` / `leaveProject` commands as text frames:
 *
 * ```json
 * {"command": "joinProject", "projectId": "65f1c0ffee"}
 * ```
 */
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::shared::membership::MembershipChange;
use crate::shared::room::{RoomId, UserId};

/// Type of real-time event, serialized with its wire name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "message:created")]
    MessageCreated,
    #[serde(rename = "message:updated")]
    MessageUpdated,
    #[serde(rename = "message:deleted")]
    MessageDeleted,
    #[serde(rename = "task:created")]
    TaskCreated,
    #[serde(rename = "task:updated")]
    TaskUpdated,
    #[serde(rename = "task:deleted")]
    TaskDeleted,
    #[serde(rename = "activity:created")]
    ActivityCreated,
    #[serde(rename = "project:member_joined")]
    MemberJoined,
    #[serde(rename = "project:member_removed")]
    MemberRemoved,
    #[serde(rename = "project:member_left")]
    MemberLeft,
    #[serde(rename = "project:owner_transferred")]
    OwnerTransferred,
    #[serde(rename = "project:admin_updated")]
    AdminUpdated,
    #[serde(rename = "project:access_revoked")]
    AccessRevoked,
    #[serde(rename = "project:access_denied")]
    AccessDenied,
}

impl EventType {
    /// Every event type, in wire-vocabulary order
    pub const ALL: [EventType; 14] = [
        Self::MessageCreated,
        Self::MessageUpdated,
        Self::MessageDeleted,
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::ActivityCreated,
        Self::MemberJoined,
        Self::MemberRemoved,
        Self::MemberLeft,
        Self::OwnerTransferred,
        Self::AdminUpdated,
        Self::AccessRevoked,
        Self::AccessDenied,
    ];

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageCreated => "message:created",
            Self::MessageUpdated => "message:updated",
            Self::MessageDeleted => "message:deleted",
            Self::TaskCreated => "task:created",
            Self::TaskUpdated => "task:updated",
            Self::TaskDeleted => "task:deleted",
            Self::ActivityCreated => "activity:created",
            Self::MemberJoined => "project:member_joined",
            Self::MemberRemoved => "project:member_removed",
            Self::MemberLeft => "project:member_left",
            Self::OwnerTransferred => "project:owner_transferred",
            Self::AdminUpdated => "project:admin_updated",
            Self::AccessRevoked => "project:access_revoked",
            Self::AccessDenied => "project:access_denied",
        }
    }

    /// Look up an event type by wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.as_str() == name)
    }

    /// Signals addressed to a single connection or identity, never to a room
    pub fn is_access_signal(&self) -> bool {
        matches!(self, Self::AccessRevoked | Self::AccessDenied)
    }

    /// Room-scoped membership notices
    pub fn is_membership_notice(&self) -> bool {
        matches!(
            self,
            Self::MemberJoined
                | Self::MemberRemoved
                | Self::MemberLeft
                | Self::OwnerTransferred
                | Self::AdminUpdated
        )
    }
}

/// Real-time event delivered to connections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    /// Type of event
    pub event: EventType,
    /// Event payload (JSON-serializable data)
    pub data: serde_json::Value,
    /// Room the event is scoped to; `None` for identity-addressed events
    #[serde(default)]
    pub room: Option<RoomId>,
    /// Timestamp when event occurred
    pub timestamp: String,
}

impl RealtimeEvent {
    /// Create a new real-time event
    pub fn new(event: EventType, room: Option<RoomId>, data: serde_json::Value) -> Self {
        Self {
            event,
            data,
            room,
            timestamp: get_timestamp(),
        }
    }

    /// Event scoped to a room
    pub fn for_room(room: &RoomId, event: EventType, data: serde_json::Value) -> Self {
        Self::new(event, Some(room.clone()), data)
    }

    /// Denial sent to the connection that attempted the join
    pub fn access_denied(room: &RoomId) -> Self {
        Self::new(
            EventType::AccessDenied,
            Some(room.clone()),
            json!({ "projectId": room }),
        )
    }

    /// Revocation sent to every connection of a removed identity
    pub fn access_revoked(room: &RoomId) -> Self {
        Self::new(
            EventType::AccessRevoked,
            Some(room.clone()),
            json!({ "projectId": room }),
        )
    }

    /// Room-wide notice describing a membership change
    pub fn membership_notice(room: &RoomId, change: MembershipChange, affected: &[UserId]) -> Self {
        Self::new(
            change.notice_event(),
            Some(room.clone()),
            json!({
                "projectId": room,
                "change": change,
                "userIds": affected,
            }),
        )
    }

    /// Room this event concerns, falling back to the `projectId` payload field
    pub fn target_room(&self) -> Option<RoomId> {
        if let Some(room) = &self.room {
            return Some(room.clone());
        }
        self.data
            .get("projectId")
            .and_then(|value| value.as_str())
            .and_then(|raw| RoomId::parse(raw).ok())
    }
}

/// Command sent by a client over the live transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ClientCommand {
    #[serde(rename = "joinProject")]
    JoinProject {
        #[serde(rename = "projectId")]
        room: RoomId,
    },
    #[serde(rename = "leaveProject")]
    LeaveProject {
        #[serde(rename = "projectId")]
        room: RoomId,
    },
}

/// Get the current timestamp as an RFC3339 string
fn get_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

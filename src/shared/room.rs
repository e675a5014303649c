//! Room and Identity Types
//!
//! A room scopes real-time delivery to one project, or to the distinguished
//! global channel. Rooms are never stored: they are derived from project
//! identifiers known to the membership store.
//!
//! # Wire Format
//!
//! Rooms travel as plain strings. The literal `"global"` names the global
//! channel; every other non-empty string is a project identifier. `"global"`
//! is therefore a reserved project identifier: a project with that id cannot
//! be addressed as a project room, and membership changes for it are rejected
//! at the ingress.
//!
//! ```json
//! {"command": "joinProject", "projectId": "65f1c0ffee"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::error::SharedError;

/// Wire name of the global channel, reserved as a project identifier
pub const GLOBAL_ROOM: &str = "global";

/// Authenticated user identity bound to a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Project identifier as issued by the project store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical delivery channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoomId {
    /// The distinguished global channel, open to every connection
    Global,
    /// A project-scoped channel gated by project membership
    Project(ProjectId),
}

impl RoomId {
    /// Room for a project. The reserved id `"global"` yields the global room,
    /// matching its wire form.
    pub fn project(id: impl Into<String>) -> Self {
        let id = id.into();
        if id == GLOBAL_ROOM {
            return Self::Global;
        }
        Self::Project(ProjectId::new(id))
    }

    /// Parse a room from its wire name
    pub fn parse(raw: &str) -> Result<Self, SharedError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SharedError::validation("projectId", "Room identifier cannot be empty"));
        }
        if trimmed == GLOBAL_ROOM {
            return Ok(Self::Global);
        }
        Ok(Self::project(trimmed))
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Project behind this room, if any
    pub fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Global => None,
            Self::Project(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => GLOBAL_ROOM,
            Self::Project(id) => id.as_str(),
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RoomId {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(room: RoomId) -> Self {
        room.as_str().to_string()
    }
}

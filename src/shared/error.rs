//! Shared Error Types
//!
//! This module defines error types that are shared between the client session
//! and the server core.
//!
//! # Error Categories
//!
//! - `SharedError` - serialization and validation failures
//! - `RealtimeError` - the real-time authorization taxonomy
//!
//! # Propagation Policy
//!
//! Authorization failures are surfaced to the originating connection only and
//! never broadcast. `StaleConnection` is dropped silently. `TransportUnavailable`
//! switches the client into polling and is not reported to application logic.
use thiserror::Error;

use crate::shared::room::RoomId;

/// Shared error types that can occur in both client and server
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

/// Real-time authorization and delivery failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// The membership oracle denied access, or could not be reached
    #[error("access to room '{room}' denied")]
    AuthDenied { room: RoomId },

    /// No valid identity for a non-global room
    #[error("room '{room}' requires an authenticated connection")]
    Unauthenticated { room: RoomId },

    /// The target connection already disconnected
    #[error("connection {connection} is no longer registered")]
    StaleConnection { connection: String },

    /// The live transport is down; the client reconciles by polling
    #[error("live transport unavailable")]
    TransportUnavailable,
}

impl RealtimeError {
    /// Whether this error is reported back to the originating connection
    pub fn is_surfaced(&self) -> bool {
        matches!(self, Self::AuthDenied { .. } | Self::Unauthenticated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = SharedError::validation("projectId", "cannot be empty");
        match error {
            SharedError::ValidationError { field, message } => {
                assert_eq!(field, "projectId");
                assert_eq!(message, "cannot be empty");
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_from_serde_error() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let shared_error: SharedError = result.unwrap_err().into();

        match shared_error {
            SharedError::SerializationError { .. } => {}
            _ => panic!("Expected SerializationError from serde error"),
        }
    }

    #[test]
    fn test_realtime_surfacing() {
        let room = RoomId::project("p1");
        assert!(RealtimeError::AuthDenied { room: room.clone() }.is_surfaced());
        assert!(RealtimeError::Unauthenticated { room }.is_surfaced());
        assert!(!RealtimeError::StaleConnection { connection: "c1".into() }.is_surfaced());
        assert!(!RealtimeError::TransportUnavailable.is_surfaced());
    }

    #[test]
    fn test_realtime_display() {
        let error = RealtimeError::AuthDenied { room: RoomId::project("p1") };
        assert_eq!(error.to_string(), "access to room 'p1' denied");
    }
}

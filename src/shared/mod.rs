//! Shared Module
//!
//! This module contains types shared between the server core and the client
//! session: rooms and identities, the event vocabulary, membership change
//! kinds, room state items, configuration and error types.
//!
//! Everything here is transport-agnostic and serializable.

/// Rooms and identities
pub mod room;

/// Real-time event vocabulary
pub mod event;

/// Membership change kinds
pub mod membership;

/// Room state items
pub mod snapshot;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use room::{ProjectId, RoomId, UserId, GLOBAL_ROOM};
pub use event::{ClientCommand, EventType, RealtimeEvent};
pub use membership::MembershipChange;
pub use snapshot::{RoomItem, RoomSnapshot};
pub use error::{RealtimeError, SharedError};
pub use config::{AppConfig, AppConfigBuilder, ConfigError};

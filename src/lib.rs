//! projecthub - Real-time Core
//!
//! The real-time membership and event fan-out core of a project-collaboration
//! application: connection-to-room binding, authorization-gated joins,
//! membership-change propagation and the polling fallback clients use while
//! the live transport is down.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and client
//!   - Rooms and identities, event vocabulary, membership changes
//!   - Room state items, configuration, error types
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Connection registry, join coordinator, membership propagator
//!   - Fan-out bus and WebSocket transport
//!   - Internal event ingress and server bootstrap
//!
//! - **`client`** - Client session state and reconciliation loop
//!
//! # Feature Flags
//!
//! - **`ssr`** - Server build (enables the `backend` module). On by default.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use projecthub::backend::realtime::{InMemoryMembershipOracle, RealtimeHub};
//! use projecthub::shared::{EventType, RoomId};
//!
//! let hub = RealtimeHub::new(Arc::new(InMemoryMembershipOracle::new()));
//! hub.publish(&RoomId::project("p1"), EventType::TaskCreated, serde_json::json!({ "_id": "t1" }));
//! ```
//!
//! # Thread Safety
//!
//! - **Server**: registry state sits behind one mutex that is never held
//!   across an await; each connection has its own unbounded queue
//! - **Client**: session state is shared as `Arc<Mutex<ClientSession>>`
//!   between the transport handler and the reconciliation loop
//!
//! # Error Handling
//!
//! Errors are `thiserror` enums: `shared::SharedError`,
//! `shared::RealtimeError`, `backend::realtime::OracleError`,
//! `backend::BackendError` and `client::sync::SyncError`.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Client session synchronization
pub mod client;

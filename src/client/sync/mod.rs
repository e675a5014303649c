//! # Client Synchronization
//!
//! Keeps a client's view of its joined rooms consistent with the server.
//!
//! ## Components
//!
//! - **`session`** - joined rooms and local room state, live event merge
//! - **`source`** - authoritative room state fetched over HTTP
//! - **`reconciliation`** - `Live` / `Degraded` polling fallback

/// Joined rooms and local room state
pub mod session;

/// Authoritative room state sources
pub mod source;

/// Polling fallback while the live transport is down
pub mod reconciliation;

pub use reconciliation::{ReconcileSummary, ReconciliationLoop, SharedSession, SyncMode, TransportStatus};
pub use session::{ClientSession, EventEffect, LocalRoomState, ACTIVITY_LIMIT};
pub use source::{HttpStateSource, RoomStateSource, SyncError};

//! Real-time Module
//!
//! Connection-to-room binding, authorization-gated joins, membership-change
//! propagation and room-scoped event fan-out.
//!
//! # Architecture
//!
//! - **`oracle`** - Membership lookups against the project store
//! - **`registry`** - Live connections indexed by room and identity
//! - **`join`** - `joinProject` / `leaveProject` processing
//! - **`propagation`** - Eviction and notices on membership changes
//! - **`broadcast`** - Room- and identity-scoped delivery
//! - **`hub`** - One handle over all of the above
//! - **`socket`** - WebSocket transport and connection actor
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── oracle.rs       - MembershipOracle trait and implementations
//! ├── registry.rs     - ConnectionRegistry
//! ├── join.rs         - JoinCoordinator
//! ├── propagation.rs  - MembershipPropagator
//! ├── broadcast.rs    - FanoutBus
//! ├── hub.rs          - RealtimeHub
//! └── socket.rs       - GET /ws handler
//! ```
//!
//! # Locking
//!
//! All registry state sits behind one `std::sync::Mutex`. The guard is never
//! held across an `.await`; the oracle lookup in a join is the only suspension
//! point, and it runs with the lock released.
//!
//! # Authorization Invariant
//!
//! A connection's room set only ever contains rooms its identity can access.
//! Joins are checked against the oracle every time, and membership changes
//! that revoke access evict synchronously before the caller responds.

/// Membership oracle
pub mod oracle;

/// Connection registry
pub mod registry;

/// Event fan-out
pub mod broadcast;

/// Join and leave processing
pub mod join;

/// Membership change propagation
pub mod propagation;

/// Facade over the real-time core
pub mod hub;

/// WebSocket transport
pub mod socket;

pub use broadcast::FanoutBus;
pub use hub::RealtimeHub;
pub use join::{Admission, JoinCoordinator, JoinOutcome, PendingJoin, DEFAULT_ORACLE_TIMEOUT};
pub use oracle::{InMemoryMembershipOracle, MembershipOracle, OracleError, PgMembershipOracle, ProjectMembership};
pub use propagation::{MembershipPropagator, PropagationReport};
pub use registry::{ConnectionId, ConnectionRegistry, SharedRegistry};
pub use socket::ws_upgrade;

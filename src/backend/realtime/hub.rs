/**
 * Realtime Hub
 *
 * Single handle over the registry, the join coordinator, the membership
 * propagator and the fan-out bus. HTTP-side collaborators and the WebSocket
 * transport both go through it.
 *
 * # Example
 *
 * ```rust,no_run
 * use std::sync::Arc;
 * use projecthub::backend::realtime::{InMemoryMembershipOracle, RealtimeHub};
 * use projecthub::shared::{EventType, MembershipChange, RoomId, UserId};
 *
 * let hub = RealtimeHub::new(Arc::new(InMemoryMembershipOracle::new()));
 * let room = RoomId::project("p1");
 * hub.publish(&room, EventType::TaskCreated, serde_json::json!({ "_id": "t1" }));
 * hub.on_membership_changed(&room, &[UserId::new("bob")], MembershipChange::MemberRemoved);
 * ```
 */

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::realtime::broadcast::FanoutBus;
use crate::backend::realtime::join::{
    Admission, JoinCoordinator, JoinOutcome, PendingJoin, DEFAULT_ORACLE_TIMEOUT,
};
use crate::backend::realtime::oracle::MembershipOracle;
use crate::backend::realtime::propagation::{MembershipPropagator, PropagationReport};
use crate::backend::realtime::registry::{
    lock_registry, new_shared_registry, ConnectionId, ConnectionSender, SharedRegistry,
};
use crate::shared::{EventType, MembershipChange, RoomId, UserId};

#[derive(Clone)]
pub struct RealtimeHub {
    registry: SharedRegistry,
    bus: FanoutBus,
    joins: JoinCoordinator,
    propagator: MembershipPropagator,
}

impl RealtimeHub {
    pub fn new(oracle: Arc<dyn MembershipOracle>) -> Self {
        Self::with_oracle_timeout(oracle, DEFAULT_ORACLE_TIMEOUT)
    }

    pub fn with_oracle_timeout(oracle: Arc<dyn MembershipOracle>, oracle_timeout: Duration) -> Self {
        let registry = new_shared_registry();
        Self {
            bus: FanoutBus::new(registry.clone()),
            joins: JoinCoordinator::new(registry.clone(), oracle, oracle_timeout),
            propagator: MembershipPropagator::new(registry.clone()),
            registry,
        }
    }

    /// Register a freshly handshaken connection
    pub fn register(&self, connection: ConnectionId, identity: Option<UserId>, sender: ConnectionSender) -> bool {
        let registered = lock_registry(&self.registry).register(connection, identity.clone(), sender);
        if registered {
            tracing::info!(
                connection_id = %connection,
                user_id = identity.as_ref().map(UserId::as_str).unwrap_or("anonymous"),
                "[Realtime] Connection registered"
            );
        }
        registered
    }

    /// Drop a connection from every room and index
    pub fn unregister(&self, connection: ConnectionId) -> Option<HashSet<RoomId>> {
        let rooms = lock_registry(&self.registry).unregister(connection);
        if let Some(rooms) = &rooms {
            tracing::info!(connection_id = %connection, rooms = rooms.len(), "[Realtime] Connection unregistered");
        }
        rooms
    }

    pub async fn join(&self, connection: ConnectionId, room: RoomId) -> JoinOutcome {
        self.joins.join(connection, room).await
    }

    pub fn admit(&self, connection: ConnectionId, room: RoomId) -> Admission {
        self.joins.admit(connection, room)
    }

    pub async fn resolve(&self, pending: PendingJoin) -> JoinOutcome {
        self.joins.resolve(pending).await
    }

    pub fn leave(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self.joins.leave(connection, room)
    }

    pub fn publish(&self, room: &RoomId, event_type: EventType, payload: serde_json::Value) -> usize {
        self.bus.publish(room, event_type, payload)
    }

    pub fn publish_to_identity(&self, identity: &UserId, event_type: EventType, payload: serde_json::Value) -> usize {
        self.bus.publish_to_identity(identity, event_type, payload)
    }

    pub fn on_membership_changed(
        &self,
        room: &RoomId,
        affected: &[UserId],
        change: MembershipChange,
    ) -> PropagationReport {
        self.propagator.on_membership_changed(room, affected, change)
    }

    pub fn members_of(&self, room: &RoomId) -> HashSet<ConnectionId> {
        lock_registry(&self.registry).members_of(room)
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> HashSet<RoomId> {
        lock_registry(&self.registry).rooms_of(connection)
    }

    pub fn connection_count(&self) -> usize {
        lock_registry(&self.registry).len()
    }

    /// Unregister connections whose writer has gone away without a clean
    /// disconnect. Returns how many were removed.
    pub fn prune_closed(&self) -> usize {
        let mut registry = lock_registry(&self.registry);
        let closed = registry.closed_connections();
        for connection in &closed {
            registry.unregister(*connection);
        }
        closed.len()
    }
}

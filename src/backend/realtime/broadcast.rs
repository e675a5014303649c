/**
 * Event Fan-out Bus
 *
 * Delivers domain events to every connection joined to a room, or to every
 * connection bound to one identity.
 *
 * # Delivery Semantics
 *
 * - Snapshot: the recipient set is `members_of(room)` at publish time. A
 *   connection joining concurrently may or may not see an in-flight publish.
 * - Isolation: each connection has its own unbounded queue. A dead connection
 *   fails only its own send and never blocks the others.
 * - Order: sends happen under the registry lock, so events published in
 *   sequence reach each connection's queue in that sequence.
 *
 * The free functions take an already-locked registry so that the membership
 * propagator can mutate and deliver in one critical section.
 */

use crate::backend::realtime::registry::{
    lock_registry, ConnectionId, ConnectionRegistry, SharedRegistry,
};
use crate::shared::{EventType, RealtimeEvent, RoomId, UserId};

/// Room- and identity-scoped event delivery
#[derive(Clone)]
pub struct FanoutBus {
    registry: SharedRegistry,
}

impl FanoutBus {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Deliver an event to every connection joined to `room`.
    ///
    /// Returns the number of connections the event was queued for.
    pub fn publish(&self, room: &RoomId, event_type: EventType, payload: serde_json::Value) -> usize {
        let event = RealtimeEvent::for_room(room, event_type, payload);
        let registry = lock_registry(&self.registry);
        let delivered = send_to_room(&registry, room, &event);
        tracing::debug!(
            room = %room,
            event = event_type.as_str(),
            delivered,
            "[Realtime] Published room event"
        );
        delivered
    }

    /// Deliver an event to every connection bound to `identity`, whatever
    /// rooms they have joined.
    pub fn publish_to_identity(
        &self,
        identity: &UserId,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> usize {
        let event = RealtimeEvent::new(event_type, None, payload);
        let registry = lock_registry(&self.registry);
        let delivered = send_to_identity(&registry, identity, &event);
        tracing::debug!(
            user_id = %identity,
            event = event_type.as_str(),
            delivered,
            "[Realtime] Published identity event"
        );
        delivered
    }
}

/// Queue an event for one connection. Returns `false` if the connection is
/// gone or its queue is closed.
pub fn send_to_connection(
    registry: &ConnectionRegistry,
    connection: ConnectionId,
    event: &RealtimeEvent,
) -> bool {
    let Some(sender) = registry.sender(connection) else {
        return false;
    };
    match sender.send(event.clone()) {
        Ok(()) => true,
        Err(_) => {
            tracing::debug!(
                connection_id = %connection,
                event = event.event.as_str(),
                "[Realtime] Dropping event for closed connection"
            );
            false
        }
    }
}

/// Queue an event for every member of `room`
pub fn send_to_room(registry: &ConnectionRegistry, room: &RoomId, event: &RealtimeEvent) -> usize {
    registry
        .members_of(room)
        .into_iter()
        .filter(|connection| send_to_connection(registry, *connection, event))
        .count()
}

/// Queue an event for every connection of `identity`
pub fn send_to_identity(registry: &ConnectionRegistry, identity: &UserId, event: &RealtimeEvent) -> usize {
    registry
        .connections_of(identity)
        .into_iter()
        .filter(|connection| send_to_connection(registry, *connection, event))
        .count()
}

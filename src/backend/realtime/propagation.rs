/**
 * Membership Change Propagator
 *
 * Applies committed membership changes to live connections.
 *
 * # Revoking Changes
 *
 * For `member_removed` and `member_left`, every live connection of an affected
 * identity is removed from the room and any in-flight join for the room is
 * voided. Each of those connections then receives exactly one
 * `project:access_revoked`, addressed to it directly. The remaining room
 * members receive the room-scoped notice.
 *
 * # Informational Changes
 *
 * `owner_transferred`, `admin_updated` and `member_joined` evict nobody and only
 * broadcast the notice. A newly joined member is not added to the live room;
 * its next `joinProject` succeeds.
 *
 * # Ordering
 *
 * Eviction and delivery happen inside one registry critical section and the
 * call returns only afterwards. A handler that responds after this call
 * returns cannot race a client into observing a stale grant.
 */

use serde::Serialize;
use std::collections::BTreeSet;

use crate::backend::realtime::broadcast::{send_to_connection, send_to_room};
use crate::backend::realtime::registry::{lock_registry, ConnectionId, SharedRegistry};
use crate::shared::{MembershipChange, RealtimeEvent, RoomId, UserId};

/// What a propagation did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationReport {
    /// Connections removed from the room
    pub evicted: Vec<ConnectionId>,
    /// Connections that were sent `access_revoked`
    pub revoked: usize,
    /// Remaining room members that were sent the notice
    pub notified: usize,
}

/// Reacts to authorization-changing events
#[derive(Clone)]
pub struct MembershipPropagator {
    registry: SharedRegistry,
}

impl MembershipPropagator {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Propagate a committed membership change for `room`
    pub fn on_membership_changed(
        &self,
        room: &RoomId,
        affected: &[UserId],
        change: MembershipChange,
    ) -> PropagationReport {
        if room.is_global() {
            tracing::warn!(change = ?change, "[Realtime] Ignoring membership change for the global room");
            return PropagationReport::default();
        }

        let affected: Vec<UserId> = affected.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let mut report = PropagationReport::default();
        let mut registry = lock_registry(&self.registry);

        if change.revokes_access() {
            let revoked = RealtimeEvent::access_revoked(room);
            for user in &affected {
                let mut connections: Vec<ConnectionId> = registry.connections_of(user).into_iter().collect();
                connections.sort();
                for connection in connections {
                    if registry.remove_room(connection, room) {
                        report.evicted.push(connection);
                    }
                    if send_to_connection(&registry, connection, &revoked) {
                        report.revoked += 1;
                    }
                }
            }
        }

        let notice = RealtimeEvent::membership_notice(room, change, &affected);
        report.notified = send_to_room(&registry, room, &notice);

        tracing::info!(
            room = %room,
            change = ?change,
            affected = affected.len(),
            evicted = report.evicted.len(),
            notified = report.notified,
            "[Realtime] Membership change propagated"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::registry::new_shared_registry;
    use crate::shared::EventType;
    use tokio::sync::mpsc;

    fn connect(
        registry: &SharedRegistry,
        user: &str,
        rooms: &[RoomId],
    ) -> (ConnectionId, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        let mut guard = lock_registry(registry);
        guard.register(id, Some(UserId::new(user)), tx);
        for room in rooms {
            guard.add_room(id, room.clone());
        }
        (id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<RealtimeEvent>) -> Vec<EventType> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event.event);
        }
        events
    }

    #[test]
    fn test_member_left_evicts_and_notifies() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");

        let (owner, mut rx_owner) = connect(&registry, "alice", &[p1.clone()]);
        let (leaver, mut rx_leaver) = connect(&registry, "bob", &[p1.clone()]);

        let report = propagator.on_membership_changed(&p1, &[UserId::new("bob")], MembershipChange::MemberLeft);

        assert_eq!(report.evicted, vec![leaver]);
        assert_eq!(report.revoked, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(lock_registry(&registry).members_of(&p1), [owner].into_iter().collect());
        assert_eq!(drain(&mut rx_leaver), vec![EventType::AccessRevoked]);
        assert_eq!(drain(&mut rx_owner), vec![EventType::MemberLeft]);
    }

    #[test]
    fn test_revocation_reaches_connections_outside_room() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");

        let (_lobby, mut rx_lobby) = connect(&registry, "bob", &[RoomId::Global]);

        let report = propagator.on_membership_changed(&p1, &[UserId::new("bob")], MembershipChange::MemberRemoved);
        assert!(report.evicted.is_empty());
        assert_eq!(report.revoked, 1);
        assert_eq!(drain(&mut rx_lobby), vec![EventType::AccessRevoked]);
    }

    #[test]
    fn test_duplicate_identities_revoked_once() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");
        let (_c, mut rx) = connect(&registry, "bob", &[p1.clone()]);

        let bob = UserId::new("bob");
        let report = propagator.on_membership_changed(&p1, &[bob.clone(), bob], MembershipChange::MemberRemoved);
        assert_eq!(report.revoked, 1);
        assert_eq!(drain(&mut rx), vec![EventType::AccessRevoked]);
    }

    #[test]
    fn test_removal_voids_in_flight_join() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");
        let (id, _rx) = connect(&registry, "bob", &[]);

        let ticket = lock_registry(&registry).begin_join(id, &p1).unwrap();
        propagator.on_membership_changed(&p1, &[UserId::new("bob")], MembershipChange::MemberRemoved);

        assert!(!lock_registry(&registry).complete_join(&ticket));
        assert!(!lock_registry(&registry).is_joined(id, &p1));
    }

    #[test]
    fn test_informational_changes_keep_members() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");
        let (_a, mut rx_a) = connect(&registry, "alice", &[p1.clone()]);
        let (_b, mut rx_b) = connect(&registry, "bob", &[p1.clone()]);

        for change in [
            MembershipChange::OwnerTransferred,
            MembershipChange::AdminUpdated,
            MembershipChange::MemberJoined,
        ] {
            let report = propagator.on_membership_changed(&p1, &[UserId::new("bob")], change);
            assert!(report.evicted.is_empty());
            assert_eq!(report.revoked, 0);
            assert_eq!(report.notified, 2);
        }

        let expected = vec![EventType::OwnerTransferred, EventType::AdminUpdated, EventType::MemberJoined];
        assert_eq!(drain(&mut rx_a), expected);
        assert_eq!(drain(&mut rx_b), expected);
        assert_eq!(lock_registry(&registry).members_of(&p1).len(), 2);
    }

    #[test]
    fn test_new_member_not_auto_joined() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let p1 = RoomId::project("p1");
        let (newcomer, _rx) = connect(&registry, "dave", &[]);

        propagator.on_membership_changed(&p1, &[UserId::new("dave")], MembershipChange::MemberJoined);
        assert!(!lock_registry(&registry).is_joined(newcomer, &p1));
    }

    #[test]
    fn test_global_room_ignored() {
        let registry = new_shared_registry();
        let propagator = MembershipPropagator::new(registry.clone());
        let (id, _rx) = connect(&registry, "bob", &[RoomId::Global]);

        let report = propagator.on_membership_changed(&RoomId::Global, &[UserId::new("bob")], MembershipChange::MemberRemoved);
        assert_eq!(report, PropagationReport::default());
        assert!(lock_registry(&registry).is_joined(id, &RoomId::Global));
    }
}

/**
 * Connection Registry
 *
 * Tracks every live connection, the identity it is bound to and the rooms
 * it has joined. The registry is the only owner of room sets; other
 * components mutate them through the methods below.
 *
 * # Indexes
 *
 * The connection table is mirrored by two indexes over the same set of
 * connections:
 * - `by_room` answers `members_of(room)` for fan-out
 * - `by_identity` answers `connections_of(user)` for revocation and
 *   identity-addressed delivery
 *
 * Both indexes are updated in the same call as the connection table, so no
 * caller can observe them disagreeing.
 *
 * # Pending Joins
 *
 * A join waits on the membership oracle. While it waits, the registry holds a
 * ticket for the (connection, room) pair. `remove_room`, `cancel_join` and
 * `unregister` void the ticket; a reply for a voided ticket is discarded.
 * A second join for a pair that already has a ticket is refused, which lets
 * callers coalesce duplicate in-flight joins.
 */

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::shared::{RealtimeEvent, RoomId, UserId};

/// Sender half of a connection's outbound queue
pub type ConnectionSender = mpsc::UnboundedSender<RealtimeEvent>;

/// Identifier of one live transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Claim on the outcome of an in-flight join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTicket {
    pub connection: ConnectionId,
    pub room: RoomId,
    seq: u64,
}

#[derive(Debug)]
struct ConnectionEntry {
    identity: Option<UserId>,
    rooms: HashSet<RoomId>,
    sender: ConnectionSender,
}

/// Live connections indexed by id, room and identity
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    by_room: HashMap<RoomId, HashSet<ConnectionId>>,
    by_identity: HashMap<UserId, HashSet<ConnectionId>>,
    pending_joins: HashMap<(ConnectionId, RoomId), u64>,
    next_seq: u64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Registering an existing id is a no-op.
    pub fn register(
        &mut self,
        connection: ConnectionId,
        identity: Option<UserId>,
        sender: ConnectionSender,
    ) -> bool {
        if self.connections.contains_key(&connection) {
            return false;
        }
        if let Some(user) = &identity {
            self.by_identity
                .entry(user.clone())
                .or_default()
                .insert(connection);
        }
        self.connections.insert(
            connection,
            ConnectionEntry {
                identity,
                rooms: HashSet::new(),
                sender,
            },
        );
        true
    }

    /// Remove a connection from every room, every index and every pending join.
    ///
    /// Returns the rooms the connection had joined, or `None` if it was not
    /// registered.
    pub fn unregister(&mut self, connection: ConnectionId) -> Option<HashSet<RoomId>> {
        let entry = self.connections.remove(&connection)?;

        for room in &entry.rooms {
            remove_from_index(&mut self.by_room, room, connection);
        }
        if let Some(user) = &entry.identity {
            remove_from_index(&mut self.by_identity, user, connection);
        }
        self.pending_joins.retain(|(pending, _), _| *pending != connection);

        Some(entry.rooms)
    }

    /// Add a room to a connection's set. Returns `true` if the set changed.
    pub fn add_room(&mut self, connection: ConnectionId, room: RoomId) -> bool {
        let Some(entry) = self.connections.get_mut(&connection) else {
            return false;
        };
        if !entry.rooms.insert(room.clone()) {
            return false;
        }
        self.by_room.entry(room).or_default().insert(connection);
        true
    }

    /// Remove a room from a connection's set and void any pending join for it.
    /// Returns `true` if the connection had joined the room.
    pub fn remove_room(&mut self, connection: ConnectionId, room: &RoomId) -> bool {
        self.cancel_join(connection, room);
        let Some(entry) = self.connections.get_mut(&connection) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        remove_from_index(&mut self.by_room, room, connection);
        true
    }

    /// Connections currently joined to `room`
    pub fn members_of(&self, room: &RoomId) -> HashSet<ConnectionId> {
        self.by_room.get(room).cloned().unwrap_or_default()
    }

    /// Rooms `connection` has joined
    pub fn rooms_of(&self, connection: ConnectionId) -> HashSet<RoomId> {
        self.connections
            .get(&connection)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    /// Live connections bound to `identity`
    pub fn connections_of(&self, identity: &UserId) -> HashSet<ConnectionId> {
        self.by_identity.get(identity).cloned().unwrap_or_default()
    }

    /// Identity bound to a connection.
    ///
    /// The outer `Option` is `None` for unknown connections; the inner one is
    /// `None` for anonymous connections.
    pub fn identity_of(&self, connection: ConnectionId) -> Option<Option<UserId>> {
        self.connections
            .get(&connection)
            .map(|entry| entry.identity.clone())
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    pub fn is_joined(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self.connections
            .get(&connection)
            .is_some_and(|entry| entry.rooms.contains(room))
    }

    pub fn sender(&self, connection: ConnectionId) -> Option<&ConnectionSender> {
        self.connections.get(&connection).map(|entry| &entry.sender)
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Open a join for (connection, room).
    ///
    /// Returns `None` if the connection is unknown or a join for the same pair
    /// is already in flight.
    pub fn begin_join(&mut self, connection: ConnectionId, room: &RoomId) -> Option<JoinTicket> {
        if !self.connections.contains_key(&connection) {
            return None;
        }
        let key = (connection, room.clone());
        if self.pending_joins.contains_key(&key) {
            return None;
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.pending_joins.insert(key, seq);
        Some(JoinTicket {
            connection,
            room: room.clone(),
            seq,
        })
    }

    /// Close a join without granting it. Returns `true` if the ticket was
    /// still current.
    pub fn finish_join(&mut self, ticket: &JoinTicket) -> bool {
        let key = (ticket.connection, ticket.room.clone());
        match self.pending_joins.get(&key) {
            Some(seq) if *seq == ticket.seq => {
                self.pending_joins.remove(&key);
                true
            }
            _ => false,
        }
    }

    /// Grant a join. The room is added only if the ticket is still current.
    pub fn complete_join(&mut self, ticket: &JoinTicket) -> bool {
        if !self.finish_join(ticket) {
            return false;
        }
        self.add_room(ticket.connection, ticket.room.clone());
        true
    }

    /// Void any in-flight join for (connection, room)
    pub fn cancel_join(&mut self, connection: ConnectionId, room: &RoomId) {
        self.pending_joins.remove(&(connection, room.clone()));
    }

    pub fn has_pending_join(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self.pending_joins.contains_key(&(connection, room.clone()))
    }

    /// Connections whose outbound queue has been dropped
    pub fn closed_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, entry)| entry.sender.is_closed())
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Registry shared between the transport, the join path and the fan-out bus
pub type SharedRegistry = Arc<Mutex<ConnectionRegistry>>;

/// Create a new empty shared registry
pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Mutex::new(ConnectionRegistry::new()))
}

/// Lock the registry. The guard must never be held across an await.
pub fn lock_registry(registry: &SharedRegistry) -> MutexGuard<'_, ConnectionRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove_from_index<K: std::hash::Hash + Eq + Clone>(
    index: &mut HashMap<K, HashSet<ConnectionId>>,
    key: &K,
    connection: ConnectionId,
) {
    if let Some(set) = index.get_mut(key) {
        set.remove(&connection);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

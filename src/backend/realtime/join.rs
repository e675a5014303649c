/**
 * Room Join Coordinator
 *
 * Processes `joinProject` / `leaveProject` commands.
 *
 * # Join
 *
 * 1. The global room is granted unconditionally, anonymous connections included.
 * 2. Anonymous connections are refused every other room.
 * 3. Otherwise the membership oracle is asked, every time. Nothing is cached.
 * 4. A grant adds the room silently. A denial sends `project:access_denied`
 *    to the requesting connection only and leaves the registry untouched.
 *
 * An oracle error or timeout is a denial (fail closed). The client sees the
 * same `access_denied`; the log records the difference.
 *
 * # Two Phases
 *
 * `admit` runs synchronously and claims a join ticket, so it can run on the
 * connection's command loop in issue order. `resolve` awaits the oracle and
 * may run on its own task. A `leave` or disconnect issued in between voids the
 * ticket and the oracle's reply is discarded.
 */

use std::sync::Arc;
use std::time::Duration;

use crate::backend::realtime::broadcast::send_to_connection;
use crate::backend::realtime::oracle::{MembershipOracle, OracleError};
use crate::backend::realtime::registry::{lock_registry, ConnectionId, JoinTicket, SharedRegistry};
use crate::shared::{RealtimeError, RealtimeEvent, RoomId, UserId};

/// Default upper bound on a membership lookup
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a join attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The room was added to the connection's set
    Joined,
    /// The oracle said no; `access_denied` was sent
    Denied,
    /// Anonymous connection asked for a project room; `access_denied` was sent
    Unauthenticated,
    /// The oracle failed or timed out; treated as a denial
    OracleUnavailable,
    /// A join for the same connection and room was already in flight
    Coalesced,
    /// The connection left the room or disconnected before the oracle replied
    Stale,
}

impl JoinOutcome {
    /// Failure behind an outcome that left the room set unchanged
    pub fn error(&self, connection: ConnectionId, room: &RoomId) -> Option<RealtimeError> {
        match self {
            Self::Joined | Self::Coalesced => None,
            Self::Denied | Self::OracleUnavailable => Some(RealtimeError::AuthDenied { room: room.clone() }),
            Self::Unauthenticated => Some(RealtimeError::Unauthenticated { room: room.clone() }),
            Self::Stale => Some(RealtimeError::StaleConnection {
                connection: connection.to_string(),
            }),
        }
    }
}

/// A join waiting on the oracle
#[derive(Debug)]
pub struct PendingJoin {
    ticket: JoinTicket,
    user: UserId,
}

/// Result of the synchronous admission phase
#[derive(Debug)]
pub enum Admission {
    Settled(JoinOutcome),
    Pending(PendingJoin),
}

/// Authorization-gated join and unconditional leave
#[derive(Clone)]
pub struct JoinCoordinator {
    registry: SharedRegistry,
    oracle: Arc<dyn MembershipOracle>,
    oracle_timeout: Duration,
}

impl JoinCoordinator {
    pub fn new(registry: SharedRegistry, oracle: Arc<dyn MembershipOracle>, oracle_timeout: Duration) -> Self {
        Self {
            registry,
            oracle,
            oracle_timeout,
        }
    }

    /// Join a room: admission followed by oracle resolution
    pub async fn join(&self, connection: ConnectionId, room: RoomId) -> JoinOutcome {
        match self.admit(connection, room) {
            Admission::Settled(outcome) => outcome,
            Admission::Pending(pending) => self.resolve(pending).await,
        }
    }

    /// Synchronous phase of a join
    pub fn admit(&self, connection: ConnectionId, room: RoomId) -> Admission {
        let mut registry = lock_registry(&self.registry);

        let Some(identity) = registry.identity_of(connection) else {
            tracing::debug!(connection_id = %connection, room = %room, "[Realtime] Join from unknown connection dropped");
            return Admission::Settled(JoinOutcome::Stale);
        };

        if room.is_global() {
            registry.add_room(connection, room);
            return Admission::Settled(JoinOutcome::Joined);
        }

        let Some(user) = identity else {
            tracing::warn!(connection_id = %connection, room = %room, "[Realtime] Anonymous connection refused project room");
            send_to_connection(&registry, connection, &RealtimeEvent::access_denied(&room));
            return Admission::Settled(JoinOutcome::Unauthenticated);
        };

        match registry.begin_join(connection, &room) {
            Some(ticket) => Admission::Pending(PendingJoin { ticket, user }),
            None => {
                tracing::debug!(connection_id = %connection, room = %room, "[Realtime] Join already in flight");
                Admission::Settled(JoinOutcome::Coalesced)
            }
        }
    }

    /// Await the oracle for a pending join and apply its answer
    pub async fn resolve(&self, pending: PendingJoin) -> JoinOutcome {
        let PendingJoin { ticket, user } = pending;

        let verdict = tokio::time::timeout(self.oracle_timeout, self.oracle.is_member(&user, &ticket.room))
            .await
            .unwrap_or(Err(OracleError::Timeout(self.oracle_timeout)));

        let mut registry = lock_registry(&self.registry);
        let connection = ticket.connection;
        let room = ticket.room.clone();

        match verdict {
            Ok(true) => {
                if registry.complete_join(&ticket) {
                    tracing::info!(connection_id = %connection, user_id = %user, room = %room, "[Realtime] Joined room");
                    JoinOutcome::Joined
                } else {
                    tracing::debug!(connection_id = %connection, room = %room, "[Realtime] Discarding stale join grant");
                    JoinOutcome::Stale
                }
            }
            Ok(false) => {
                if !registry.finish_join(&ticket) {
                    return JoinOutcome::Stale;
                }
                tracing::warn!(connection_id = %connection, user_id = %user, room = %room, "[Realtime] Join denied");
                send_to_connection(&registry, connection, &RealtimeEvent::access_denied(&room));
                JoinOutcome::Denied
            }
            Err(e) => {
                if !registry.finish_join(&ticket) {
                    return JoinOutcome::Stale;
                }
                tracing::warn!(
                    connection_id = %connection,
                    user_id = %user,
                    room = %room,
                    error = %e,
                    "[Realtime] Membership lookup failed, denying join"
                );
                send_to_connection(&registry, connection, &RealtimeEvent::access_denied(&room));
                JoinOutcome::OracleUnavailable
            }
        }
    }

    /// Leave a room. Always permitted; voids any in-flight join for it.
    pub fn leave(&self, connection: ConnectionId, room: &RoomId) -> bool {
        let left = lock_registry(&self.registry).remove_room(connection, room);
        if left {
            tracing::debug!(connection_id = %connection, room = %room, "[Realtime] Left room");
        }
        left
    }
}

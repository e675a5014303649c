/**
 * WebSocket Transport
 *
 * `GET /ws?token=<jwt>` upgrades to a WebSocket bound to the token's identity,
 * or to an anonymous connection when the token is missing or invalid.
 *
 * # Connection Actor
 *
 * Each connection runs as three cooperating parts:
 * - reader loop: parses `joinProject` / `leaveProject` text frames
 * - writer task: owns the sink; serializes queued events and control frames
 * - ping task: pings every 30 s and closes after a 10 s pong timeout
 *
 * Commands are handled in arrival order. The admission step of a join runs on
 * the reader loop; only the oracle wait is moved to its own task, so a
 * `leaveProject` that follows a `joinProject` always voids it.
 */

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::backend::auth::identity_from_token;
use crate::backend::realtime::hub::RealtimeHub;
use crate::backend::realtime::join::{Admission, JoinOutcome};
use crate::backend::realtime::registry::ConnectionId;
use crate::backend::server::state::AppState;
use crate::shared::{ClientCommand, RealtimeEvent, RoomId, UserId};

const PING_INTERVAL: Duration = Duration::from_secs(30);

const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// How long the writer may take to flush a close frame
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Close code sent when the peer stops answering pings
const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Handle the WebSocket handshake (GET /ws)
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let identity = identity_from_token(&state.jwt_secret, params.token.as_deref());
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_connection(socket, hub, identity))
}

/// Run one connection until the peer disconnects
pub async fn run_connection(socket: WebSocket, hub: RealtimeHub, identity: Option<UserId>) {
    let connection = ConnectionId::new();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (events_tx, events_rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    hub.register(connection, identity.clone(), events_tx);

    let mut writer_handle = tokio::spawn(writer_task(connection, ws_sender, events_rx, control_rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(keepalive(connection, control_tx.clone(), pong_rx));

    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut ping_handle => {
                tracing::debug!(connection_id = %connection, "[Realtime] Keepalive ended, dropping connection");
                // Let the writer flush the close frame
                let _ = timeout(CLOSE_GRACE, &mut writer_handle).await;
                break;
            }
            _ = &mut writer_handle => {
                tracing::debug!(connection_id = %connection, "[Realtime] Writer stopped, dropping connection");
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => handle_command(&hub, connection, text.as_str()),
            Some(Ok(Message::Binary(_))) => {
                tracing::debug!(connection_id = %connection, "[Realtime] Ignoring binary frame");
            }
            Some(Ok(Message::Pong(_))) => {
                let _ = pong_tx.send(());
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = control_tx.send(Message::Pong(data));
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(connection_id = %connection, reason = ?frame, "[Realtime] Client initiated close");
                break;
            }
            Some(Err(e)) => {
                tracing::warn!(connection_id = %connection, error = %e, "[Realtime] WebSocket receive error");
                break;
            }
            None => break,
        }
    }

    ping_handle.abort();
    writer_handle.abort();
    hub.unregister(connection);
}

/// Ping the peer every `PING_INTERVAL`. Returns once a pong fails to arrive
/// within `PONG_TIMEOUT` (after queueing a close frame) or the control queue
/// is gone.
pub async fn keepalive(
    connection: ConnectionId,
    control: mpsc::UnboundedSender<Message>,
    mut pongs: mpsc::UnboundedReceiver<()>,
) {
    let mut ping_timer = interval(PING_INTERVAL);
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;
        if control.send(Message::Ping(Bytes::from_static(b"ping"))).is_err() {
            return;
        }
        match timeout(PONG_TIMEOUT, pongs.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!(connection_id = %connection, "[Realtime] Pong timeout, closing connection");
                let _ = control.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Pong timeout".into(),
                })));
                return;
            }
        }
    }
}

/// Dispatch one client command
pub fn handle_command(hub: &RealtimeHub, connection: ConnectionId, raw: &str) {
    let command = match serde_json::from_str::<ClientCommand>(raw) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(connection_id = %connection, error = %e, "[Realtime] Ignoring malformed command");
            return;
        }
    };

    match command {
        ClientCommand::JoinProject { room } => match hub.admit(connection, room.clone()) {
            Admission::Settled(outcome) => log_join(connection, &room, outcome),
            Admission::Pending(pending) => {
                let hub = hub.clone();
                tokio::spawn(async move {
                    let outcome = hub.resolve(pending).await;
                    log_join(connection, &room, outcome);
                });
            }
        },
        ClientCommand::LeaveProject { room } => {
            hub.leave(connection, &room);
        }
    }
}

fn log_join(connection: ConnectionId, room: &RoomId, outcome: JoinOutcome) {
    match outcome.error(connection, room) {
        Some(error) => tracing::debug!(
            connection_id = %connection,
            outcome = ?outcome,
            surfaced = error.is_surfaced(),
            error = %error,
            "[Realtime] Join refused"
        ),
        None => tracing::debug!(connection_id = %connection, room = %room, outcome = ?outcome, "[Realtime] Join settled"),
    }
}

async fn writer_task(
    connection: ConnectionId,
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut events: mpsc::UnboundedReceiver<RealtimeEvent>,
    mut control: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let frame = tokio::select! {
            Some(event) = events.recv() => match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    tracing::error!(connection_id = %connection, error = %e, "[Realtime] Failed to serialize event");
                    continue;
                }
            },
            Some(frame) = control.recv() => frame,
            else => break,
        };

        let closing = matches!(frame, Message::Close(_));
        if ws_sender.send(frame).await.is_err() || closing {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::oracle::InMemoryMembershipOracle;
    use crate::shared::{EventType, ProjectId, RoomId};
    use std::sync::Arc;

    fn hub_with_project() -> RealtimeHub {
        let oracle = Arc::new(InMemoryMembershipOracle::new());
        oracle.create_project(ProjectId::new("p1"), UserId::new("alice"));
        RealtimeHub::new(oracle)
    }

    #[tokio::test]
    async fn test_join_then_leave_in_order() {
        let hub = hub_with_project();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        hub.register(id, Some(UserId::new("alice")), tx);

        handle_command(&hub, id, r#"{"command":"joinProject","projectId":"p1"}"#);
        handle_command(&hub, id, r#"{"command":"leaveProject","projectId":"p1"}"#);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(hub.rooms_of(id).is_empty());
    }

    #[tokio::test]
    async fn test_global_join_is_immediate() {
        let hub = hub_with_project();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        hub.register(id, None, tx);

        handle_command(&hub, id, r#"{"command":"joinProject","projectId":"global"}"#);
        assert!(hub.rooms_of(id).contains(&RoomId::Global));
    }

    #[tokio::test]
    async fn test_malformed_command_ignored() {
        let hub = hub_with_project();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        hub.register(id, Some(UserId::new("alice")), tx);

        handle_command(&hub, id, "not json");
        handle_command(&hub, id, r#"{"command":"deleteProject","projectId":"p1"}"#);
        handle_command(&hub, id, r#"{"command":"joinProject","projectId":""}"#);

        assert!(hub.rooms_of(id).is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_anonymous_project_join_denied() {
        let hub = hub_with_project();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        hub.register(id, None, tx);

        handle_command(&hub, id, r#"{"command":"joinProject","projectId":"p1"}"#);
        assert_eq!(rx.recv().await.unwrap().event, EventType::AccessDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_gives_up_without_pong() {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (_pong_tx, pong_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(keepalive(ConnectionId::new(), control_tx, pong_rx));

        tokio::time::sleep(PING_INTERVAL + Duration::from_secs(1)).await;
        assert!(matches!(control_rx.try_recv(), Ok(Message::Ping(_))));
        assert!(!handle.is_finished());

        tokio::time::sleep(PONG_TIMEOUT).await;
        match control_rx.try_recv() {
            Ok(Message::Close(Some(frame))) => assert_eq!(frame.code, CLOSE_GOING_AWAY),
            other => panic!("expected close frame, got {:?}", other),
        }
        assert!(timeout(Duration::from_secs(1), handle).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_survives_answered_pings() {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (pong_tx, pong_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(keepalive(ConnectionId::new(), control_tx, pong_rx));

        let responder = tokio::spawn(async move {
            let mut pings = 0;
            while let Some(frame) = control_rx.recv().await {
                match frame {
                    Message::Ping(_) => {
                        pings += 1;
                        let _ = pong_tx.send(());
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            pings
        });

        tokio::time::sleep(PING_INTERVAL * 3 + Duration::from_secs(1)).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert_eq!(responder.await.unwrap(), 3);
    }
}

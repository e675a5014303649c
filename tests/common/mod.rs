//! Common test utilities and helpers
//!
//! Spawns the real router on an ephemeral port with an in-memory membership
//! oracle, and wraps a tokio-tungstenite client for driving `/ws`.

#![allow(dead_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use projecthub::backend::auth::create_token;
use projecthub::backend::realtime::{InMemoryMembershipOracle, RealtimeHub};
use projecthub::backend::routes::create_router;
use projecthub::backend::server::AppState;
use projecthub::shared::{ClientCommand, ProjectId, RealtimeEvent, RoomId, UserId};

pub const JWT_SECRET: &[u8] = b"integration-secret";
pub const SERVICE_TOKEN: &str = "integration-service-token";

/// How long to wait for a frame that should arrive
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait before concluding nothing will arrive
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: RealtimeHub,
    pub oracle: Arc<InMemoryMembershipOracle>,
}

impl TestServer {
    /// Start the router on 127.0.0.1 with the internal ingress enabled
    pub async fn start() -> Self {
        let oracle = Arc::new(InMemoryMembershipOracle::new());
        let hub = RealtimeHub::new(oracle.clone());
        let state = AppState::new(hub.clone(), JWT_SECRET).with_internal_token(SERVICE_TOKEN);

        let app = create_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hub, oracle }
    }

    /// Create a project owned by `owner` with `members`
    pub fn project(&self, id: &str, owner: &str, members: &[&str]) -> RoomId {
        let project = ProjectId::new(id);
        self.oracle.create_project(project.clone(), UserId::new(owner));
        for member in members {
            self.oracle.add_member(&project, UserId::new(*member));
        }
        RoomId::project(id)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Open a connection authenticated as `user`
    pub async fn connect_as(&self, user: &str) -> TestClient {
        let token = create_token(JWT_SECRET, &UserId::new(user), Duration::from_secs(3600)).unwrap();
        self.connect_url(format!("ws://{}/ws?token={}", self.addr, token)).await
    }

    /// Open a connection without credentials
    pub async fn connect_anonymous(&self) -> TestClient {
        self.connect_url(format!("ws://{}/ws", self.addr)).await
    }

    /// Open a connection to an explicit handshake URL
    pub async fn connect_url(&self, url: String) -> TestClient {
        let before = self.hub.connection_count();
        let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        let (write, read) = stream.split();
        wait_until(|| self.hub.connection_count() > before).await;
        TestClient { write, read }
    }

    /// POST a JSON body to an internal route with the service token
    pub async fn post_internal(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.http_url(path))
            .bearer_auth(SERVICE_TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

pub struct TestClient {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

impl TestClient {
    pub async fn send_command(&mut self, command: &ClientCommand) {
        let json = serde_json::to_string(command).unwrap();
        self.write.send(Message::Text(json.into())).await.unwrap();
    }

    pub async fn join(&mut self, room: &RoomId) {
        self.send_command(&ClientCommand::JoinProject { room: room.clone() }).await;
    }

    pub async fn leave(&mut self, room: &RoomId) {
        self.send_command(&ClientCommand::LeaveProject { room: room.clone() }).await;
    }

    /// Next event, skipping control frames
    pub async fn next_event(&mut self) -> Option<RealtimeEvent> {
        self.next_event_within(RECV_TIMEOUT).await
    }

    /// Assert no event arrives within the quiet period
    pub async fn expect_silence(&mut self) {
        if let Some(event) = self.next_event_within(QUIET_PERIOD).await {
            panic!("expected no event, got {:?}", event);
        }
    }

    async fn next_event_within(&mut self, window: Duration) -> Option<RealtimeEvent> {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.read.next()).await.ok()??;
            match frame.ok()? {
                Message::Text(text) => return serde_json::from_str(text.as_str()).ok(),
                Message::Close(_) => return None,
                _ => continue,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.write.send(Message::Close(None)).await;
    }
}

/// Poll a condition until it holds or the receive timeout elapses
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the server shows `count` connections in `room`
pub async fn wait_for_members(server: &TestServer, room: &RoomId, count: usize) {
    wait_until(|| server.hub.members_of(room).len() == count).await;
}

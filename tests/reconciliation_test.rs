//! Degraded-mode convergence of a client session against a scripted store

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use projecthub::client::sync::{
    ClientSession, EventEffect, ReconciliationLoop, RoomStateSource, SharedSession, SyncError, SyncMode,
    TransportStatus,
};
use projecthub::shared::{EventType, ProjectId, RealtimeEvent, RoomId, RoomSnapshot};
use projecthub::shared::snapshot::parse_items;

const POLL: Duration = Duration::from_secs(5);

/// Store whose answers the test rewrites between polls
#[derive(Default)]
struct ScriptedStore {
    tasks: Mutex<HashMap<ProjectId, Vec<&'static str>>>,
    forbidden: Mutex<HashSet<ProjectId>>,
    fetches: AtomicUsize,
}

impl ScriptedStore {
    fn set_tasks(&self, project: &str, ids: &[&'static str]) {
        self.tasks.lock().unwrap().insert(ProjectId::new(project), ids.to_vec());
    }

    fn forbid(&self, project: &str) {
        self.forbidden.lock().unwrap().insert(ProjectId::new(project));
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomStateSource for ScriptedStore {
    async fn fetch_room(&self, project: &ProjectId) -> Result<RoomSnapshot, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.forbidden.lock().unwrap().contains(project) {
            return Err(SyncError::Forbidden(project.clone()));
        }
        let ids = self.tasks.lock().unwrap().get(project).cloned().unwrap_or_default();
        Ok(RoomSnapshot {
            tasks: parse_items(ids.into_iter().map(|id| json!({ "_id": id })).collect()),
            ..RoomSnapshot::default()
        })
    }
}

fn task_ids(session: &SharedSession, room: &RoomId) -> Vec<String> {
    session
        .lock()
        .unwrap()
        .room(room)
        .map(|state| state.tasks.iter().map(|task| task.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test(start_paused = true)]
async fn test_degraded_session_converges_and_stops_on_reconnect() {
    let p1 = RoomId::project("p1");
    let p2 = RoomId::project("p2");

    let mut session = ClientSession::new();
    session.join_room(RoomId::Global);
    session.join_room(p1.clone());
    session.join_room(p2.clone());
    let stale = RealtimeEvent::for_room(&p1, EventType::TaskCreated, json!({ "_id": "t-old" }));
    assert_eq!(session.apply_event(&stale), EventEffect::Applied);
    let session: SharedSession = Arc::new(Mutex::new(session));

    let store = Arc::new(ScriptedStore::default());
    store.set_tasks("p1", &["t1"]);
    store.set_tasks("p2", &["x1"]);

    let sync = ReconciliationLoop::new(session.clone(), store.clone(), POLL);
    let mut mode = sync.subscribe_mode();
    let (status_tx, status_rx) = watch::channel(TransportStatus::Connected);
    let handle = tokio::spawn(sync.run(status_rx));

    status_tx.send(TransportStatus::Disconnected).unwrap();
    mode.changed().await.unwrap();
    assert_eq!(*mode.borrow(), SyncMode::Degraded);

    // First poll replaces local state wholesale
    tokio::time::sleep(POLL + Duration::from_millis(100)).await;
    assert_eq!(store.fetches(), 2);
    assert_eq!(task_ids(&session, &p1), vec!["t1"]);
    assert_eq!(task_ids(&session, &p2), vec!["x1"]);

    // Changes committed while offline show up on the next poll
    store.set_tasks("p1", &["t1", "t2"]);
    store.forbid("p2");
    tokio::time::sleep(POLL).await;
    assert_eq!(task_ids(&session, &p1), vec!["t1", "t2"]);
    assert!(!session.lock().unwrap().is_joined(&p2));
    assert_eq!(
        session.lock().unwrap().joined_rooms().cloned().collect::<Vec<_>>(),
        vec![RoomId::Global, p1.clone()]
    );

    // Reconnect: one catch-up fetch, then no more polling
    store.set_tasks("p1", &["t3"]);
    let before = store.fetches();
    status_tx.send(TransportStatus::Connected).unwrap();
    mode.changed().await.unwrap();
    assert_eq!(*mode.borrow(), SyncMode::Live);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.fetches(), before + 1);
    assert_eq!(task_ids(&session, &p1), vec!["t3"]);

    tokio::time::sleep(POLL * 4).await;
    assert_eq!(store.fetches(), before + 1);

    drop(status_tx);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_keeps_local_state() {
    struct DownStore;

    #[async_trait]
    impl RoomStateSource for DownStore {
        async fn fetch_room(&self, _project: &ProjectId) -> Result<RoomSnapshot, SyncError> {
            Err(SyncError::Status {
                status: 503,
                url: "http://store/tasks/p1".into(),
            })
        }
    }

    let p1 = RoomId::project("p1");
    let mut session = ClientSession::new();
    session.join_room(p1.clone());
    session.apply_event(&RealtimeEvent::for_room(&p1, EventType::TaskCreated, json!({ "_id": "t1" })));
    let session: SharedSession = Arc::new(Mutex::new(session));

    let sync = ReconciliationLoop::new(session.clone(), Arc::new(DownStore), POLL);
    sync.handle_transport(TransportStatus::Disconnected).await;
    let summary = sync.reconcile().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.dropped, 0);
    assert_eq!(task_ids(&session, &p1), vec!["t1"]);
    assert_eq!(sync.mode(), SyncMode::Degraded);
}

//! # Reconciliation Fallback
//!
//! Keeps a client session converging on the authoritative store while the
//! live transport is down.
//!
//! ## Modes
//!
//! - **Live**: the transport is up; events arrive over it and no timer runs.
//! - **Degraded**: the transport is down; every `poll_interval` each joined
//!   project room is re-fetched and replaced wholesale.
//!
//! `Live -> Degraded` happens on a transport disconnect. `Degraded -> Live`
//! happens on a transport connect and is followed by one immediate fetch, so
//! nothing missed during the gap survives.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::{Arc, Mutex};
//! use projecthub::client::sync::{ClientSession, HttpStateSource, ReconciliationLoop, TransportStatus};
//! use projecthub::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::builder().server_url("http://localhost:5000").build()?;
//! let session = Arc::new(Mutex::new(ClientSession::new()));
//! let source = Arc::new(HttpStateSource::new(&config)?);
//! let (status_tx, status_rx) = tokio::sync::watch::channel(TransportStatus::Connected);
//!
//! let sync = ReconciliationLoop::new(session, source, config.poll_interval);
//! tokio::spawn(sync.run(status_rx));
//! status_tx.send(TransportStatus::Disconnected)?;
//! # Ok(())
//! # }
//! ```

use futures_util::future::join_all;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::client::sync::session::ClientSession;
use crate::client::sync::source::RoomStateSource;
use crate::shared::{RealtimeError, RoomId};

/// Session shared between the transport event handler and the loop
pub type SharedSession = Arc<Mutex<ClientSession>>;

/// Liveness of the real-time transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Connected,
    Disconnected,
}

/// Delivery path currently keeping the session fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Live,
    Degraded,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub refreshed: usize,
    pub dropped: usize,
    pub failed: usize,
}

/// Polling fallback for one client session
pub struct ReconciliationLoop {
    session: SharedSession,
    source: Arc<dyn RoomStateSource>,
    poll_interval: Duration,
    mode: watch::Sender<SyncMode>,
}

impl ReconciliationLoop {
    pub fn new(session: SharedSession, source: Arc<dyn RoomStateSource>, poll_interval: Duration) -> Self {
        let (mode, _) = watch::channel(SyncMode::Live);
        Self {
            session,
            source,
            poll_interval,
            mode,
        }
    }

    pub fn mode(&self) -> SyncMode {
        *self.mode.borrow()
    }

    /// Observe mode transitions
    pub fn subscribe_mode(&self) -> watch::Receiver<SyncMode> {
        self.mode.subscribe()
    }

    /// Drive the loop until the transport status sender is dropped
    pub async fn run(self, mut status: watch::Receiver<TransportStatus>) {
        let initial = *status.borrow_and_update();
        self.handle_transport(initial).await;

        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = status.changed() => {
                    if changed.is_err() {
                        tracing::debug!("[Sync] Transport status closed, stopping reconciliation");
                        break;
                    }
                    let current = *status.borrow_and_update();
                    if self.handle_transport(current).await == Some(SyncMode::Degraded) {
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if self.mode() == SyncMode::Degraded => {
                    self.reconcile().await;
                }
            }
        }
    }

    /// Apply a transport status change. Returns the new mode if it changed.
    pub async fn handle_transport(&self, status: TransportStatus) -> Option<SyncMode> {
        match (self.mode(), status) {
            (SyncMode::Live, TransportStatus::Disconnected) => {
                tracing::warn!(
                    interval = ?self.poll_interval,
                    reason = %RealtimeError::TransportUnavailable,
                    "[Sync] Transport lost, polling room state"
                );
                self.mode.send_replace(SyncMode::Degraded);
                Some(SyncMode::Degraded)
            }
            (SyncMode::Degraded, TransportStatus::Connected) => {
                tracing::info!("[Sync] Transport restored, reconciling once");
                self.mode.send_replace(SyncMode::Live);
                self.reconcile().await;
                Some(SyncMode::Live)
            }
            _ => None,
        }
    }

    /// Re-fetch every joined project room and replace its local state
    pub async fn reconcile(&self) -> ReconcileSummary {
        let rooms = self.lock_session().project_rooms();

        let fetches = rooms.iter().filter_map(|room| {
            let project = room.project_id()?;
            let source = Arc::clone(&self.source);
            Some(async move { (room.clone(), source.fetch_room(project).await) })
        });
        let results = join_all(fetches).await;

        let mut summary = ReconcileSummary::default();
        let mut session = self.lock_session();
        for (room, result) in results {
            match result {
                Ok(snapshot) => {
                    if session.apply_snapshot(&room, snapshot) {
                        summary.refreshed += 1;
                    }
                }
                Err(e) if e.is_forbidden() => {
                    tracing::info!(room = %room, "[Sync] Access revoked, dropping room");
                    if session.drop_room(&room) {
                        summary.dropped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(room = %room, error = %e, "[Sync] Fetch failed, keeping local state");
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(
            refreshed = summary.refreshed,
            dropped = summary.dropped,
            failed = summary.failed,
            "[Sync] Reconciliation pass finished"
        );
        summary
    }

    fn lock_session(&self) -> MutexGuard<'_, ClientSession> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rooms the session would rejoin after a reconnect
pub fn rooms_to_rejoin(session: &SharedSession) -> Vec<RoomId> {
    session
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .joined_rooms()
        .cloned()
        .collect()
}

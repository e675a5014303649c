/**
 * Application State Management
 *
 * `AppState` is the state shared by every handler. `FromRef` lets handlers
 * extract just the part they need.
 *
 * # Thread Safety
 *
 * Every field is cheap to clone. The hub shares its registry behind a mutex,
 * the secret is an `Arc`, and `PgPool` is itself a shared handle.
 */

use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::backend::realtime::RealtimeHub;

#[derive(Clone)]
pub struct AppState {
    /// Real-time core
    pub hub: RealtimeHub,

    /// HS256 secret for handshake tokens
    pub jwt_secret: Arc<Vec<u8>>,

    /// Service token guarding `/internal/*`
    ///
    /// `None` disables the internal ingress entirely.
    pub internal_token: Option<Arc<str>>,

    /// Database connection pool
    ///
    /// `None` when no project store is configured; the hub then runs on the
    /// in-memory oracle.
    pub db_pool: Option<PgPool>,

    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(hub: RealtimeHub, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            hub,
            jwt_secret: Arc::new(jwt_secret.into()),
            internal_token: None,
            db_pool: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_internal_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.internal_token = Some(token.into());
        self
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }
}

impl FromRef<AppState> for RealtimeHub {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

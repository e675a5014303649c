/**
 * API Route Handlers
 *
 * # Routes
 *
 * - `GET /api/health` - liveness, live connection count and oracle backend
 */

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::backend::server::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
    pub connections: usize,
    pub database: bool,
    pub uptime_secs: i64,
}

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/api/health", get(health))
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok".to_string(),
        time: now.to_rfc3339(),
        connections: state.hub.connection_count(),
        database: state.db_pool.is_some(),
        uptime_secs: (now - state.started_at).num_seconds(),
    })
}

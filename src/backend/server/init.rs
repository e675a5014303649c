/**
 * Server Initialization
 *
 * Builds the application state from configuration and assembles the router.
 *
 * # Initialization Process
 *
 * 1. Configure the project store pool, if a URL is set
 * 2. Pick the membership oracle: PostgreSQL when a URL is set, in-memory
 *    otherwise
 * 3. Create the real-time hub and the shared state
 * 4. Start the periodic sweep of dead connections
 * 5. Create the router
 */

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::realtime::{InMemoryMembershipOracle, MembershipOracle, PgMembershipOracle, RealtimeHub};
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{check_database, load_database, ServerConfig};
use crate::backend::server::state::AppState;

/// How often connections with a dropped writer are swept from the registry
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the shared state from configuration
pub async fn build_state(config: &ServerConfig) -> Result<AppState, sqlx::Error> {
    let db_pool = load_database(config.database_url.as_deref())?;

    let oracle: Arc<dyn MembershipOracle> = match &db_pool {
        Some(pool) => Arc::new(PgMembershipOracle::new(pool.clone())),
        None => Arc::new(InMemoryMembershipOracle::new()),
    };
    let hub = RealtimeHub::with_oracle_timeout(oracle, config.oracle_timeout);

    let mut state = AppState::new(hub, config.jwt_secret.clone());
    if let Some(token) = &config.internal_token {
        state = state.with_internal_token(token.as_str());
    } else {
        tracing::warn!("INTERNAL_API_TOKEN not set. Internal event ingress is disabled.");
    }
    if let Some(pool) = db_pool {
        state = state.with_db_pool(pool);
    }
    Ok(state)
}

/// Create and configure the Axum application
pub async fn create_app(config: &ServerConfig) -> Result<Router<()>, sqlx::Error> {
    tracing::info!("Initializing projecthub realtime server");

    let state = build_state(config).await?;
    if let Some(pool) = state.db_pool.clone() {
        tokio::spawn(async move { check_database(&pool).await });
    }
    spawn_prune_task(state.hub.clone(), PRUNE_INTERVAL);

    let app = create_router(state);
    tracing::info!("Router configured with periodic connection sweep");
    Ok(app)
}

/// Periodically unregister connections whose writer has gone away
pub fn spawn_prune_task(hub: RealtimeHub, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let pruned = hub.prune_closed();
            if pruned > 0 {
                tracing::info!(pruned, "[Realtime] Swept dead connections");
            } else {
                tracing::debug!("[Realtime] No dead connections to sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::{ConnectionId, JoinOutcome};
    use crate::shared::{EventType, RoomId, UserId};
    use tokio::sync::mpsc;

    fn config() -> ServerConfig {
        ServerConfig {
            port: 0,
            database_url: None,
            jwt_secret: "secret".into(),
            internal_token: Some("svc".into()),
            oracle_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_build_state_without_database() {
        let state = build_state(&config()).await.unwrap();
        assert!(state.db_pool.is_none());
        assert_eq!(state.internal_token.as_deref(), Some("svc"));
        assert_eq!(state.jwt_secret.as_slice(), b"secret");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_task_sweeps_dead_connections() {
        let state = build_state(&config()).await.unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        state.hub.register(ConnectionId::new(), None, tx);
        drop(rx);

        let handle = spawn_prune_task(state.hub.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(state.hub.connection_count(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_closed() {
        let config = ServerConfig {
            database_url: Some("postgres://u:p@127.0.0.1:1/db".into()),
            oracle_timeout: Duration::from_millis(500),
            ..config()
        };
        let state = build_state(&config).await.unwrap();
        assert!(state.db_pool.is_some());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        state.hub.register(id, Some(UserId::new("alice")), tx);

        let outcome = state.hub.join(id, RoomId::project("p1")).await;
        assert_eq!(outcome, JoinOutcome::OracleUnavailable);
        assert_eq!(rx.recv().await.unwrap().event, EventType::AccessDenied);
    }

    #[tokio::test]
    async fn test_malformed_database_url_fails_startup() {
        let config = ServerConfig {
            database_url: Some("not a database url".into()),
            ..config()
        };
        assert!(build_state(&config).await.is_err());
    }
}

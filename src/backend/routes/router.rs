/**
 * Router Configuration
 *
 * Combines every route into one Axum router.
 *
 * # Routes
 *
 * - `GET /ws` - WebSocket upgrade for the live transport
 * - `GET /api/health` - health check
 * - `POST /internal/...` - event ingress, mounted only when a service token is
 *   configured
 *
 * Requests are traced with `tower_http::trace::TraceLayer`.
 */

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::realtime::ws_upgrade;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::routes::internal_routes::configure_internal_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new().route("/ws", get(ws_upgrade));

    let router = configure_api_routes(router);

    let router = if app_state.internal_token.is_some() {
        configure_internal_routes(router, app_state.clone())
    } else {
        router
    };

    router
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::{InMemoryMembershipOracle, RealtimeHub};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::new(RealtimeHub::new(Arc::new(InMemoryMembershipOracle::new())), "secret")
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_internal_routes_absent_without_token() {
        let app = create_router(state());
        let response = app
            .oneshot(
                Request::post("/internal/events")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"projectId":"p1","event":"task:created"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_routes_require_token() {
        let app = create_router(state().with_internal_token("svc"));
        let request = |auth: Option<&str>| {
            let mut builder = Request::post("/internal/events").header("content-type", "application/json");
            if let Some(auth) = auth {
                builder = builder.header("authorization", auth);
            }
            builder
                .body(Body::from(r#"{"projectId":"p1","event":"task:created","data":{}}"#))
                .unwrap()
        };

        let response = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.clone().oneshot(request(Some("Bearer wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(request(Some("Bearer svc"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_global_membership_change_rejected() {
        let app = create_router(state().with_internal_token("svc"));
        let response = app
            .oneshot(
                Request::post("/internal/membership")
                    .header("content-type", "application/json")
                    .header("authorization", "Bearer svc")
                    .body(Body::from(r#"{"projectId":"global","userIds":["bob"],"change":"member_removed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

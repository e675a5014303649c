/**
 * Internal Event Ingress
 *
 * HTTP entry points for collaborators that commit mutations in another
 * process. Each handler responds only after delivery has been queued, and for
 * membership changes only after eviction has completed.
 *
 * # Routes
 *
 * - `POST /internal/events` - room-scoped domain event
 * - `POST /internal/identity-events` - event for every connection of a user
 * - `POST /internal/membership` - committed membership change
 *
 * All routes require the service token (see `middleware::auth`).
 */

use axum::{
    extract::State,
    middleware,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::backend::error::BackendError;
use crate::backend::middleware::internal_auth_middleware;
use crate::backend::realtime::{PropagationReport, RealtimeHub};
use crate::backend::server::state::AppState;
use crate::shared::{EventType, MembershipChange, RoomId, UserId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub project_id: String,
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityEventRequest {
    pub user_id: UserId,
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    pub project_id: String,
    pub user_ids: Vec<UserId>,
    pub change: MembershipChange,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub delivered: usize,
}

/// Add the internal routes, guarded by the service token
pub fn configure_internal_routes(router: Router<AppState>, state: AppState) -> Router<AppState> {
    let internal = Router::new()
        .route("/internal/events", post(publish_event))
        .route("/internal/identity-events", post(publish_identity_event))
        .route("/internal/membership", post(membership_changed))
        .route_layer(middleware::from_fn_with_state(state, internal_auth_middleware));

    router.merge(internal)
}

/// Resolve a wire event name accepted from collaborators.
///
/// Access signals are produced by the core itself and cannot be injected.
fn domain_event(name: &str) -> Result<EventType, BackendError> {
    let event = EventType::from_wire(name)
        .ok_or_else(|| BackendError::bad_request(format!("Unknown event type '{}'", name)))?;
    if event.is_access_signal() {
        return Err(BackendError::bad_request(format!(
            "Event '{}' cannot be published through the ingress",
            name
        )));
    }
    Ok(event)
}

/// POST /internal/events
pub async fn publish_event(
    State(hub): State<RealtimeHub>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<DeliveryResponse>, BackendError> {
    let room = RoomId::parse(&request.project_id)?;
    let event = domain_event(&request.event)?;
    let delivered = hub.publish(&room, event, request.data);
    Ok(Json(DeliveryResponse { delivered }))
}

/// POST /internal/identity-events
pub async fn publish_identity_event(
    State(hub): State<RealtimeHub>,
    Json(request): Json<IdentityEventRequest>,
) -> Result<Json<DeliveryResponse>, BackendError> {
    if request.user_id.as_str().is_empty() {
        return Err(BackendError::bad_request("userId cannot be empty"));
    }
    let event = domain_event(&request.event)?;
    let delivered = hub.publish_to_identity(&request.user_id, event, request.data);
    Ok(Json(DeliveryResponse { delivered }))
}

/// POST /internal/membership
pub async fn membership_changed(
    State(hub): State<RealtimeHub>,
    Json(request): Json<MembershipRequest>,
) -> Result<Json<PropagationReport>, BackendError> {
    let room = RoomId::parse(&request.project_id)?;
    if room.is_global() {
        return Err(BackendError::bad_request("The global room has no membership"));
    }
    let report = hub.on_membership_changed(&room, &request.user_ids, request.change);
    Ok(Json(report))
}

/**
 * Internal Service Authentication
 *
 * Guards the `/internal/` ingress routes used by the web API process to publish
 * events and report membership changes. Callers present the shared service
 * token as `Authorization: Bearer <token>`.
 */

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use subtle::ConstantTimeEq;

use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

/// Reject requests that do not carry the configured service token
pub async fn internal_auth_middleware(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let Some(expected) = app_state.internal_token.as_deref() else {
        return Err(BackendError::unauthorized("Internal ingress is disabled"));
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| BackendError::unauthorized("Missing service token"))?;

    if !constant_time_str_eq(presented, expected) {
        return Err(BackendError::unauthorized("Invalid service token"));
    }

    Ok(next.run(request).await)
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

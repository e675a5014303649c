//! # Room State Source
//!
//! Where the reconciliation loop fetches authoritative room state from.
//!
//! `HttpStateSource` reads the web API with the session's bearer token:
//!
//! - `GET {api}/tasks/{project}`
//! - `GET {api}/tasks/activity/{project}`
//! - `GET {api}/messages/{project}`
//!
//! The three requests run concurrently. A `403` on any of them means the
//! caller has lost access to the project.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::shared::snapshot::parse_items;
use crate::shared::{AppConfig, ConfigError, ProjectId, RoomSnapshot};

/// Request timeout for a single fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to fetch room state
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("access to project {0} was revoked")]
    Forbidden(ProjectId),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Whether the failure means the room must be dropped
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Source of authoritative room state
#[async_trait]
pub trait RoomStateSource: Send + Sync {
    async fn fetch_room(&self, project: &ProjectId) -> Result<RoomSnapshot, SyncError>;
}

/// Room state fetched from the web API
#[derive(Debug, Clone)]
pub struct HttpStateSource {
    client: reqwest::Client,
    api_base: String,
    auth_token: Option<String>,
}

impl HttpStateSource {
    pub fn new(config: &AppConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_base: config.api_base(),
            auth_token: config.auth_token.clone(),
        })
    }

    async fn fetch_list(&self, path: &str, project: &ProjectId) -> Result<Vec<serde_json::Value>, SyncError> {
        let url = format!("{}/{}/{}", self.api_base, path, project);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::FORBIDDEN => Err(SyncError::Forbidden(project.clone())),
            status if status.is_success() => Ok(response.json::<Vec<serde_json::Value>>().await?),
            status => Err(SyncError::Status {
                status: status.as_u16(),
                url,
            }),
        }
    }
}

#[async_trait]
impl RoomStateSource for HttpStateSource {
    async fn fetch_room(&self, project: &ProjectId) -> Result<RoomSnapshot, SyncError> {
        let (tasks, activity, messages) = tokio::try_join!(
            self.fetch_list("tasks", project),
            self.fetch_list("tasks/activity", project),
            self.fetch_list("messages", project),
        )?;

        tracing::debug!(
            project = %project,
            tasks = tasks.len(),
            activity = activity.len(),
            messages = messages.len(),
            "[Sync] Fetched room state"
        );

        Ok(RoomSnapshot {
            messages: parse_items(messages),
            tasks: parse_items(tasks),
            activity: parse_items(activity),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_config() {
        let config = AppConfig {
            server_url: "localhost:5000".into(),
            auth_token: None,
            poll_interval: Duration::from_secs(5),
        };
        assert!(matches!(HttpStateSource::new(&config), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_forbidden_classification() {
        assert!(SyncError::Forbidden(ProjectId::new("p1")).is_forbidden());
        assert!(!SyncError::Status { status: 500, url: "x".into() }.is_forbidden());
    }
}

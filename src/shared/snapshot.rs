//! Room state items as returned by the project store.
//!
//! Items are kept as raw JSON documents. Only the identifier and the most
//! recent timestamp are interpreted; both are read from the field names the
//! store emits (`_id`/`id`, `updatedAt`/`createdAt`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// A message, task or activity entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomItem {
    pub id: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub body: serde_json::Value,
}

impl RoomItem {
    /// Build an item from a store document
    pub fn from_value(body: serde_json::Value) -> Result<Self, SharedError> {
        let id = body
            .get("_id")
            .or_else(|| body.get("id"))
            .and_then(|value| value.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SharedError::validation("_id", "Item has no identifier"))?
            .to_string();

        let updated_at = ["updatedAt", "createdAt"]
            .iter()
            .filter_map(|key| body.get(*key).and_then(|value| value.as_str()))
            .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));

        Ok(Self { id, updated_at, body })
    }

    /// Whether this item was written strictly after `other`
    pub fn is_newer_than(&self, other: &RoomItem) -> bool {
        match (self.updated_at, other.updated_at) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

/// Authoritative state of one room at a point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomSnapshot {
    pub messages: Vec<RoomItem>,
    pub tasks: Vec<RoomItem>,
    pub activity: Vec<RoomItem>,
}

/// Parse a list of store documents, skipping entries without an identifier
pub fn parse_items(values: Vec<serde_json::Value>) -> Vec<RoomItem> {
    values
        .into_iter()
        .filter_map(|value| match RoomItem::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::debug!("Skipping room item: {}", e);
                None
            }
        })
        .collect()
}

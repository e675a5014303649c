//! # Client Session State
//!
//! The rooms a client has joined and its local copy of each room's messages,
//! tasks and activity.
//!
//! ## Merge Rules
//!
//! - **Live events** upsert or remove one item. An upsert never replaces a
//!   local copy with a strictly newer timestamp.
//! - **Snapshots** replace the room wholesale: items missing from the
//!   snapshot are dropped, and for items in both, the newer copy wins.
//! - **Access signals** (`access_revoked`, `access_denied`) drop the room and
//!   all of its state.
//! - **Membership notices** keep the state and flag the room so the caller
//!   can refresh its member list.

use std::collections::{BTreeSet, HashMap};

use crate::shared::snapshot::RoomItem;
use crate::shared::{ClientCommand, EventType, RealtimeEvent, RoomId, RoomSnapshot};

/// Activity entries kept per room, newest first
pub const ACTIVITY_LIMIT: usize = 50;

/// Local copy of one room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalRoomState {
    pub messages: Vec<RoomItem>,
    pub tasks: Vec<RoomItem>,
    pub activity: Vec<RoomItem>,
    /// Set by membership notices, cleared by `take_membership_refresh`
    pub membership_stale: bool,
}

impl LocalRoomState {
    /// Replace the state with an authoritative snapshot
    pub fn apply_snapshot(&mut self, snapshot: RoomSnapshot) {
        self.messages = merge_wholesale(&self.messages, snapshot.messages);
        self.tasks = merge_wholesale(&self.tasks, snapshot.tasks);
        self.activity = merge_wholesale(&self.activity, snapshot.activity);
        self.activity.truncate(ACTIVITY_LIMIT);
    }

    fn record_activity(&mut self, item: RoomItem) {
        if self.activity.iter().any(|existing| existing.id == item.id) {
            upsert(&mut self.activity, item);
            return;
        }
        self.activity.insert(0, item);
        self.activity.truncate(ACTIVITY_LIMIT);
    }
}

/// What applying a live event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    /// Local room state changed
    Applied,
    /// The room and its state were dropped
    RoomDropped,
    /// The room's membership should be re-fetched
    MembershipRefresh,
    /// Nothing changed
    Ignored,
}

/// Rooms joined by one client and their local state
#[derive(Debug, Default)]
pub struct ClientSession {
    joined_rooms: BTreeSet<RoomId>,
    rooms: HashMap<RoomId, LocalRoomState>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a joined room. Returns the command to send, or `None` if the
    /// room was already joined.
    pub fn join_room(&mut self, room: RoomId) -> Option<ClientCommand> {
        if !self.joined_rooms.insert(room.clone()) {
            return None;
        }
        self.rooms.entry(room.clone()).or_default();
        Some(ClientCommand::JoinProject { room })
    }

    /// Leave a room and discard its state
    pub fn leave_room(&mut self, room: &RoomId) -> Option<ClientCommand> {
        if !self.drop_room(room) {
            return None;
        }
        Some(ClientCommand::LeaveProject { room: room.clone() })
    }

    /// Forget a room without telling the server
    pub fn drop_room(&mut self, room: &RoomId) -> bool {
        self.rooms.remove(room);
        self.joined_rooms.remove(room)
    }

    pub fn is_joined(&self, room: &RoomId) -> bool {
        self.joined_rooms.contains(room)
    }

    pub fn joined_rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.joined_rooms.iter()
    }

    /// Joined rooms that carry project state
    pub fn project_rooms(&self) -> Vec<RoomId> {
        self.joined_rooms.iter().filter(|room| !room.is_global()).cloned().collect()
    }

    pub fn room(&self, room: &RoomId) -> Option<&LocalRoomState> {
        self.rooms.get(room)
    }

    /// Commands that restore every joined room on a fresh transport
    pub fn rejoin_commands(&self) -> Vec<ClientCommand> {
        self.joined_rooms
            .iter()
            .map(|room| ClientCommand::JoinProject { room: room.clone() })
            .collect()
    }

    /// Clear and return the membership refresh flag for a room
    pub fn take_membership_refresh(&mut self, room: &RoomId) -> bool {
        self.rooms
            .get_mut(room)
            .map(|state| std::mem::take(&mut state.membership_stale))
            .unwrap_or(false)
    }

    /// Replace a joined room's state with a snapshot. Snapshots for rooms
    /// that are no longer joined are discarded.
    pub fn apply_snapshot(&mut self, room: &RoomId, snapshot: RoomSnapshot) -> bool {
        if !self.joined_rooms.contains(room) {
            return false;
        }
        self.rooms.entry(room.clone()).or_default().apply_snapshot(snapshot);
        true
    }

    /// Apply one live event
    pub fn apply_event(&mut self, event: &RealtimeEvent) -> EventEffect {
        let Some(room) = event.target_room() else {
            return EventEffect::Ignored;
        };

        if event.event.is_access_signal() {
            tracing::info!(room = %room, event = event.event.as_str(), "[Sync] Lost access to room");
            return if self.drop_room(&room) {
                EventEffect::RoomDropped
            } else {
                EventEffect::Ignored
            };
        }

        if !self.joined_rooms.contains(&room) {
            return EventEffect::Ignored;
        }
        let state = self.rooms.entry(room).or_default();

        if event.event.is_membership_notice() {
            state.membership_stale = true;
            return EventEffect::MembershipRefresh;
        }

        let changed = match event.event {
            EventType::MessageCreated | EventType::MessageUpdated => {
                item_from(event).is_some_and(|item| upsert(&mut state.messages, item))
            }
            EventType::TaskCreated | EventType::TaskUpdated => {
                item_from(event).is_some_and(|item| upsert(&mut state.tasks, item))
            }
            EventType::MessageDeleted => deleted_id(event).is_some_and(|id| remove(&mut state.messages, id)),
            EventType::TaskDeleted => deleted_id(event).is_some_and(|id| remove(&mut state.tasks, id)),
            EventType::ActivityCreated => match item_from(event) {
                Some(item) => {
                    state.record_activity(item);
                    true
                }
                None => false,
            },
            _ => false,
        };

        if changed {
            EventEffect::Applied
        } else {
            EventEffect::Ignored
        }
    }
}

fn item_from(event: &RealtimeEvent) -> Option<RoomItem> {
    match RoomItem::from_value(event.data.clone()) {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::debug!(event = event.event.as_str(), error = %e, "[Sync] Ignoring event without item");
            None
        }
    }
}

fn deleted_id(event: &RealtimeEvent) -> Option<&str> {
    event
        .data
        .get("_id")
        .or_else(|| event.data.get("id"))
        .and_then(|value| value.as_str())
}

/// Insert or replace by id unless the local copy is strictly newer
fn upsert(items: &mut Vec<RoomItem>, item: RoomItem) -> bool {
    match items.iter_mut().find(|existing| existing.id == item.id) {
        Some(existing) if existing.is_newer_than(&item) => false,
        Some(existing) => {
            *existing = item;
            true
        }
        None => {
            items.push(item);
            true
        }
    }
}

fn remove(items: &mut Vec<RoomItem>, id: &str) -> bool {
    let before = items.len();
    items.retain(|item| item.id != id);
    items.len() != before
}

/// Take the remote set, keeping a local copy only where it is newer
fn merge_wholesale(local: &[RoomItem], remote: Vec<RoomItem>) -> Vec<RoomItem> {
    remote
        .into_iter()
        .map(|theirs| match local.iter().find(|mine| mine.id == theirs.id) {
            Some(mine) if mine.is_newer_than(&theirs) => mine.clone(),
            _ => theirs,
        })
        .collect()
}

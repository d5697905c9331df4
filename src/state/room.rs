use indexmap::IndexMap;

use crate::{
    dto::room::{ParticipantPayload, RoomSummary},
    state::readiness::{Participant, ReadinessSnapshot},
};

/// A room as resolved by a participant before joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Room identifier.
    pub id: String,
    /// Host at resolution time; later snapshots are authoritative.
    pub host_username: Option<String>,
    /// Opaque reference to the content played in the room.
    pub content_uri: String,
}

/// Relay-side record of a room: its content and its members in join order.
#[derive(Debug, Clone, Default)]
pub struct RoomRecord {
    content_uri: Option<String>,
    participants: IndexMap<String, bool>,
    host: Option<String>,
}

impl RoomRecord {
    /// Registered content reference, if any.
    pub fn content_uri(&self) -> Option<&str> {
        self.content_uri.as_deref()
    }

    /// Register (or replace) the content reference.
    pub fn set_content_uri(&mut self, uri: String) {
        self.content_uri = Some(uri);
    }

    /// Current host; `None` while the room is empty.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Whether nobody has joined.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Add `username` as not ready; rejoining keeps the current flag.
    ///
    /// The first member of an empty room becomes host.
    pub fn join(&mut self, username: &str) -> bool {
        let added = !self.participants.contains_key(username);
        if added {
            self.participants.insert(username.to_string(), false);
        }
        if self.host.is_none() {
            self.host = Some(username.to_string());
            return true;
        }
        added
    }

    /// Remove `username`, promoting the earliest remaining joiner if it was host.
    pub fn leave(&mut self, username: &str) -> bool {
        if self.participants.shift_remove(username).is_none() {
            return false;
        }
        if self.host.as_deref() == Some(username) {
            self.host = self.participants.keys().next().cloned();
        }
        true
    }

    /// Update the ready flag of a member; unknown members are ignored.
    pub fn set_ready(&mut self, username: &str, ready: bool) -> bool {
        match self.participants.get_mut(username) {
            Some(flag) if *flag != ready => {
                *flag = ready;
                true
            }
            _ => false,
        }
    }

    /// Readiness broadcast for the room's state topic.
    pub fn snapshot(&self) -> ReadinessSnapshot {
        ReadinessSnapshot {
            participants: self
                .participants
                .iter()
                .map(|(username, ready)| Participant::new(username.clone(), *ready))
                .collect(),
            host_username: self.host.clone().unwrap_or_default(),
        }
    }

    /// REST view of the room.
    pub fn summary(&self, room_id: &str) -> RoomSummary {
        RoomSummary {
            room_id: room_id.to_string(),
            host_username: self.host.clone(),
            content_uri: self.content_uri.clone(),
            participants: self
                .participants
                .iter()
                .map(|(username, ready)| ParticipantPayload {
                    username: username.clone(),
                    ready: *ready,
                })
                .collect(),
        }
    }
}

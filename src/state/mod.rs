/// Chat log and outbound validation.
pub mod chat;
/// Countdown coordinator.
pub mod countdown;
/// Readiness tracker.
pub mod readiness;
/// Relay rooms and resolved room descriptions.
pub mod room;
/// Per-session state and its published view.
pub mod session;
/// Time-sync formatting.
pub mod sync;
pub mod transitions;

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::extract::ws::Message;
use dashmap::{DashMap, mapref::one::RefMut};
use tokio::sync::mpsc;
use uuid::Uuid;

use self::room::RoomRecord;

pub use self::session::{SessionState, SessionView};

/// Relay state shared across handlers.
pub type SharedState = Arc<RelayState>;

/// Handle used to push frames to a connected participant socket.
pub struct ClientConnection {
    /// Socket id.
    pub id: Uuid,
    /// Queue drained by the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
    subscriptions: HashSet<String>,
    /// Rooms this socket joined, with the username it joined as.
    memberships: HashMap<String, String>,
}

/// Central relay state: rooms and the sockets subscribed to their topics.
pub struct RelayState {
    rooms: DashMap<String, RoomRecord>,
    connections: DashMap<Uuid, ClientConnection>,
}

impl RelayState {
    /// Construct a new [`RelayState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new() -> SharedState {
        Arc::new(Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
        })
    }

    /// Register a freshly upgraded socket.
    pub fn register_connection(&self, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ClientConnection {
                id,
                tx,
                subscriptions: HashSet::new(),
                memberships: HashMap::new(),
            },
        );
        id
    }

    /// Forget a socket, returning the rooms it still had joined.
    pub fn remove_connection(&self, id: Uuid) -> HashMap<String, String> {
        self.connections
            .remove(&id)
            .map(|(_, connection)| connection.memberships)
            .unwrap_or_default()
    }

    /// Record a topic subscription; returns false when it already existed.
    pub fn subscribe(&self, id: Uuid, topic: &str) -> bool {
        self.connections
            .get_mut(&id)
            .is_some_and(|mut connection| connection.subscriptions.insert(topic.to_string()))
    }

    /// Remember which username a socket joined a room as.
    pub fn record_membership(&self, id: Uuid, room_id: &str, username: &str) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection
                .memberships
                .insert(room_id.to_string(), username.to_string());
        }
    }

    /// Drop a membership after an explicit leave.
    pub fn forget_membership(&self, id: Uuid, room_id: &str) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.memberships.remove(room_id);
        }
    }

    /// Username a socket joined `room_id` as, if any.
    pub fn membership(&self, id: Uuid, room_id: &str) -> Option<String> {
        self.connections
            .get(&id)
            .and_then(|connection| connection.memberships.get(room_id).cloned())
    }

    /// Whether a socket other than `except` joined `room_id` as `username`.
    pub fn joined_elsewhere(&self, except: Uuid, room_id: &str, username: &str) -> bool {
        self.connections.iter().any(|connection| {
            connection.id != except
                && connection
                    .memberships
                    .get(room_id)
                    .is_some_and(|name| name == username)
        })
    }

    /// Mutable access to a room, creating it on first use.
    pub fn room_mut(&self, room_id: &str) -> RefMut<'_, String, RoomRecord> {
        self.rooms.entry(room_id.to_string()).or_default()
    }

    /// Drop a room once its last member left and no content is registered.
    pub fn prune_room(&self, room_id: &str) -> bool {
        self.rooms
            .remove_if(room_id, |_, room| {
                room.is_empty() && room.content_uri().is_none()
            })
            .is_some()
    }

    /// Read a room through `f` without creating it.
    pub fn read_room<T>(&self, room_id: &str, f: impl FnOnce(&RoomRecord) -> T) -> Option<T> {
        self.rooms.get(room_id).map(|room| f(room.value()))
    }

    /// Queue `body` on every socket subscribed to `topic`.
    pub fn broadcast(&self, topic: &str, text: &str) {
        for connection in self.connections.iter() {
            if connection.subscriptions.contains(topic) {
                let _ = connection.tx.send(Message::Text(text.to_string().into()));
            }
        }
    }

    /// Number of rooms currently tracked.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of open sockets.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

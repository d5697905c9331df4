use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Frames a participant sends to the relay.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving broadcasts published on `topic`.
    Subscribe { topic: String },
    /// Publish `body` (a JSON-encoded record) to `destination`.
    Send { destination: String, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Frames the relay pushes to subscribed participants.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Broadcast delivered on `topic`.
    Message { topic: String, body: String },
}

/// An outbound publish: a destination and its JSON-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    /// Relay destination, e.g. `/app/room/{id}/ready`.
    pub destination: String,
    /// JSON-encoded record.
    pub body: String,
}

impl Publish {
    /// Encode `payload` for `destination`.
    pub fn json<T: Serialize>(destination: String, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            destination,
            body: serde_json::to_string(payload)?,
        })
    }
}

impl From<Publish> for ClientFrame {
    fn from(value: Publish) -> Self {
        ClientFrame::Send {
            destination: value.destination,
            body: value.body,
        }
    }
}

impl ClientFrame {
    /// Decode a text frame received over the socket.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ServerFrame {
    /// Decode a text frame received over the socket.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

//! Payload records exchanged on the room topics and destinations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::readiness::{Participant, ReadinessSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Wire shape of a single participant inside a readiness broadcast.
pub struct ParticipantPayload {
    /// Member name.
    pub username: String,
    /// Ready flag.
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Readiness broadcast received on the state topic.
pub struct ReadinessStatePayload {
    /// Members in join order.
    pub participants: Vec<ParticipantPayload>,
    /// Current host; empty when the room is empty.
    pub host_username: String,
}

impl From<ReadinessStatePayload> for ReadinessSnapshot {
    fn from(value: ReadinessStatePayload) -> Self {
        Self {
            participants: value
                .participants
                .into_iter()
                .map(|p| Participant {
                    username: p.username,
                    ready: p.ready,
                })
                .collect(),
            host_username: value.host_username,
        }
    }
}

impl From<&ReadinessSnapshot> for ReadinessStatePayload {
    fn from(value: &ReadinessSnapshot) -> Self {
        Self {
            participants: value
                .participants
                .iter()
                .map(|p| ParticipantPayload {
                    username: p.username.clone(),
                    ready: p.ready,
                })
                .collect(),
            host_username: value.host_username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Playback position broadcast received on the time topic.
pub struct PlaybackPositionPayload {
    /// Host position in seconds.
    pub current_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Chat broadcast received on the chat topic.
pub struct ChatBroadcastPayload {
    /// Author.
    pub sender: String,
    /// Trimmed message text.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Body of the join, leave, ready and not-ready publishes.
pub struct RoomEventPayload {
    /// Target room.
    pub room_id: String,
    /// Participant the event is about.
    pub sender: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Body of the host-only share-time publish.
pub struct ShareTimePayload {
    /// Target room.
    pub room_id: String,
    /// Host position in seconds.
    pub current_time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Body of the send-chat publish.
pub struct SendChatPayload {
    /// Target room.
    pub room_id: String,
    /// Author.
    pub sender: String,
    /// Message text.
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Request body registering the content reference of a room.
pub struct RoomContentRequest {
    /// Absolute URL of the content.
    #[validate(url)]
    pub content_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Room description served by the relay and read by the content resolver.
pub struct RoomSummary {
    /// Room identifier.
    pub room_id: String,
    /// Current host, if anyone joined.
    pub host_username: Option<String>,
    /// Registered content reference.
    pub content_uri: Option<String>,
    /// Members in join order.
    pub participants: Vec<ParticipantPayload>,
}

//! Typed dispatch from room topics to session inputs.

use std::collections::HashMap;

use crate::{
    dto::{
        room::{ChatBroadcastPayload, PlaybackPositionPayload, ReadinessStatePayload},
        topics,
    },
    error::DecodeError,
    state::{sync::TimeSyncEvent, transitions::SessionInput},
};

/// Inbound broadcast channels of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Readiness snapshots on `/topic/room/{id}/state`.
    ReadinessState,
    /// Host positions on `/topic/room/{id}/time`.
    PlaybackPosition,
    /// Chat messages on `/topic/room/{id}/chat`.
    Chat,
}

impl Channel {
    /// Decode a broadcast body into the session input it stands for.
    pub fn decode(self, body: &str) -> Result<SessionInput, DecodeError> {
        match self {
            Channel::ReadinessState => {
                let payload: ReadinessStatePayload = serde_json::from_str(body)?;
                Ok(SessionInput::Readiness(payload.into()))
            }
            Channel::PlaybackPosition => {
                let payload: PlaybackPositionPayload = serde_json::from_str(body)?;
                if !payload.current_time.is_finite() || payload.current_time < 0.0 {
                    return Err(DecodeError::InvalidValue(format!(
                        "playback position {}",
                        payload.current_time
                    )));
                }
                Ok(SessionInput::TimeSync(TimeSyncEvent {
                    current_time: payload.current_time,
                }))
            }
            Channel::Chat => {
                let payload: ChatBroadcastPayload = serde_json::from_str(body)?;
                Ok(SessionInput::Chat {
                    sender: payload.sender,
                    content: payload.content,
                })
            }
        }
    }
}

/// Maps each subscribed topic of one room to its channel.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: HashMap<String, Channel>,
}

impl DispatchTable {
    /// Table for the three broadcast topics of `room_id`.
    pub fn for_room(room_id: &str) -> Self {
        let routes = HashMap::from([
            (topics::state_topic(room_id), Channel::ReadinessState),
            (topics::time_topic(room_id), Channel::PlaybackPosition),
            (topics::chat_topic(room_id), Channel::Chat),
        ]);
        Self { routes }
    }

    /// Channel registered for `topic`.
    pub fn channel(&self, topic: &str) -> Option<Channel> {
        self.routes.get(topic).copied()
    }

    /// Route and decode a broadcast.
    pub fn decode(&self, topic: &str, body: &str) -> Result<SessionInput, DecodeError> {
        let channel = self
            .channel(topic)
            .ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;
        channel.decode(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_each_room_topic() {
        let table = DispatchTable::for_room("r1");

        assert_eq!(
            table.channel("/topic/room/r1/state"),
            Some(Channel::ReadinessState)
        );
        assert_eq!(
            table.channel("/topic/room/r1/time"),
            Some(Channel::PlaybackPosition)
        );
        assert_eq!(table.channel("/topic/room/r1/chat"), Some(Channel::Chat));
        assert_eq!(table.channel("/topic/room/r2/chat"), None);
    }

    #[test]
    fn decodes_time_sync() {
        let table = DispatchTable::for_room("r1");
        let input = table
            .decode("/topic/room/r1/time", r#"{"currentTime":125}"#)
            .unwrap();

        assert_eq!(
            input,
            SessionInput::TimeSync(TimeSyncEvent {
                current_time: 125.0
            })
        );
    }

    #[test]
    fn rejects_bad_payloads() {
        let table = DispatchTable::for_room("r1");

        assert!(matches!(
            table.decode("/topic/room/r1/time", r#"{"currentTime":-1}"#),
            Err(DecodeError::InvalidValue(_))
        ));
        assert!(matches!(
            table.decode("/topic/room/r1/state", "not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            table.decode("/topic/room/r1/chat", r#"{"sender":"A"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            table.decode("/topic/other", "{}"),
            Err(DecodeError::UnknownTopic(_))
        ));
    }
}

//! Room-scoped topic and destination names.

const TOPIC_PREFIX: &str = "/topic/room/";
const APP_PREFIX: &str = "/app/room/";

/// Inbound broadcast carrying the readiness snapshot.
pub fn state_topic(room_id: &str) -> String {
    format!("{TOPIC_PREFIX}{room_id}/state")
}

/// Inbound broadcast carrying the host's playback position.
pub fn time_topic(room_id: &str) -> String {
    format!("{TOPIC_PREFIX}{room_id}/time")
}

/// Inbound broadcast carrying chat messages.
pub fn chat_topic(room_id: &str) -> String {
    format!("{TOPIC_PREFIX}{room_id}/chat")
}

/// Outbound actions a participant can publish for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    Join,
    Leave,
    Ready,
    NotReady,
    ShareTime,
    Chat,
}

impl RoomAction {
    fn segment(self) -> &'static str {
        match self {
            RoomAction::Join => "join",
            RoomAction::Leave => "leave",
            RoomAction::Ready => "ready",
            RoomAction::NotReady => "not-ready",
            RoomAction::ShareTime => "share-time",
            RoomAction::Chat => "chat",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        let action = match segment {
            "join" => RoomAction::Join,
            "leave" => RoomAction::Leave,
            "ready" => RoomAction::Ready,
            "not-ready" => RoomAction::NotReady,
            "share-time" => RoomAction::ShareTime,
            "chat" => RoomAction::Chat,
            _ => return None,
        };
        Some(action)
    }
}

/// Build the destination for `action` in `room_id`.
pub fn destination(room_id: &str, action: RoomAction) -> String {
    format!("{APP_PREFIX}{room_id}/{}", action.segment())
}

/// Split a destination back into its room and action.
pub fn parse_destination(destination: &str) -> Option<(&str, RoomAction)> {
    let rest = destination.strip_prefix(APP_PREFIX)?;
    let (room_id, segment) = rest.rsplit_once('/')?;
    if room_id.is_empty() || room_id.contains('/') {
        return None;
    }
    RoomAction::from_segment(segment).map(|action| (room_id, action))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations_parse_back() {
        let dest = destination("movie-night", RoomAction::NotReady);
        assert_eq!(dest, "/app/room/movie-night/not-ready");
        assert_eq!(
            parse_destination(&dest),
            Some(("movie-night", RoomAction::NotReady))
        );
    }

    #[test]
    fn foreign_destinations_are_rejected() {
        assert_eq!(parse_destination("/app/room/r1/dance"), None);
        assert_eq!(parse_destination("/app/room//join"), None);
        assert_eq!(parse_destination("/app/room/a/b/join"), None);
        assert_eq!(parse_destination("/topic/room/r1/state"), None);
    }
}

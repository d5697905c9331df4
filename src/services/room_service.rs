use tracing::info;

use crate::{
    dto::room::{RoomContentRequest, RoomSummary},
    error::ServiceError,
    state::SharedState,
};

/// Register the content played in `room_id`, creating the room when needed.
pub fn set_content(
    state: &SharedState,
    room_id: &str,
    request: RoomContentRequest,
) -> Result<RoomSummary, ServiceError> {
    if room_id.trim().is_empty() {
        return Err(ServiceError::InvalidInput("room id must not be blank".into()));
    }

    let mut room = state.room_mut(room_id);
    room.set_content_uri(request.content_uri);
    info!(room = %room_id, content = ?room.content_uri(), "room content registered");
    Ok(room.summary(room_id))
}

/// Describe a room known to the relay.
pub fn room_summary(state: &SharedState, room_id: &str) -> Result<RoomSummary, ServiceError> {
    state
        .read_room(room_id, |room| room.summary(room_id))
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RelayState;

    #[test]
    fn unknown_room_is_not_found() {
        let state = RelayState::new();
        assert!(matches!(
            room_summary(&state, "missing"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn registered_content_is_served_back() {
        let state = RelayState::new();
        set_content(
            &state,
            "r1",
            RoomContentRequest {
                content_uri: "https://cdn.example.com/movie.mp4".into(),
            },
        )
        .unwrap();
        state.room_mut("r1").join("A");

        let summary = room_summary(&state, "r1").unwrap();
        assert_eq!(
            summary.content_uri.as_deref(),
            Some("https://cdn.example.com/movie.mp4")
        );
        assert_eq!(summary.host_username.as_deref(), Some("A"));
    }
}

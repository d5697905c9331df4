use crate::{dto::health::HealthResponse, state::SharedState};

/// Report relay liveness along with room and socket counts.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.room_count(), state.connection_count())
}

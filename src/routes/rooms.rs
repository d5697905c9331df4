use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use validator::Validate;

use crate::{
    dto::room::{RoomContentRequest, RoomSummary},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Room registration and lookup endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{room_id}", get(get_room).put(put_room_content))
}

/// Describe a room: its host, content and participants.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Room found", body = RoomSummary),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    Ok(Json(room_service::room_summary(&state, &room_id)?))
}

/// Register the content played in a room.
#[utoipa::path(
    put,
    path = "/rooms/{room_id}",
    tag = "rooms",
    params(("room_id" = String, Path, description = "Room identifier")),
    request_body = RoomContentRequest,
    responses(
        (status = 200, description = "Content registered", body = RoomSummary),
        (status = 400, description = "Invalid content reference")
    )
)]
pub async fn put_room_content(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    Json(payload): Json<RoomContentRequest>,
) -> Result<Json<RoomSummary>, AppError> {
    payload.validate()?;
    Ok(Json(room_service::set_content(&state, &room_id, payload)?))
}

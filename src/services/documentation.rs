use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the watch-party relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::get_room,
        crate::routes::rooms::put_room_content,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::frame::ClientFrame,
            crate::dto::frame::ServerFrame,
            crate::dto::room::RoomContentRequest,
            crate::dto::room::RoomSummary,
            crate::dto::room::ParticipantPayload,
            crate::dto::room::ReadinessStatePayload,
            crate::dto::room::PlaybackPositionPayload,
            crate::dto::room::ChatBroadcastPayload,
            crate::dto::room::RoomEventPayload,
            crate::dto::room::ShareTimePayload,
            crate::dto::room::SendChatPayload,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room registration and lookup"),
        (name = "relay", description = "WebSocket topic relay for room sessions"),
    )
)]
pub struct ApiDoc;

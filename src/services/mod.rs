/// Room content resolution with retries.
pub mod content_service;
/// Topic-keyed decoding of inbound broadcasts.
pub mod dispatch;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room session controller and its caller handle.
pub mod lobby_service;
/// Media player abstraction.
pub mod player;
/// Relay-side WebSocket connection and frame handling.
pub mod relay_service;
/// Room registration and lookup for the REST surface.
pub mod room_service;
/// Cancellable session timers.
pub mod timers;
/// Client-side topic transports.
pub mod transport;

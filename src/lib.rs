//! Watch-party playback synchronization: the room session engine and the relay it talks to.

/// Runtime configuration.
pub mod config;
/// Wire records and topic names.
pub mod dto;
/// Error types.
pub mod error;
/// Relay HTTP and WebSocket routes.
pub mod routes;
/// Session controller, transports and relay services.
pub mod services;
/// Session and relay state.
pub mod state;

use axum::Router;

use crate::state::SharedState;

/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// Room REST routes.
pub mod rooms;
/// Relay socket upgrade.
pub mod websocket;

/// Compose all route trees and attach the shared relay state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(rooms::router())
        .merge(docs::router())
        .with_state(state)
}

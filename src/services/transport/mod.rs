//! Duplex, topic-based session transport.

mod recording;
mod websocket;

use tokio::sync::mpsc;

use crate::dto::frame::Publish;

pub use self::recording::{RecordingTransport, TransportProbe};
pub use self::websocket::WsTransport;

/// Notifications a transport delivers to the session, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A connection (or reconnection) is established.
    Connected,
    /// The current connection was lost; a reconnect may follow.
    Disconnected,
    /// A broadcast arrived on a subscribed topic.
    Message { topic: String, body: String },
}

/// Room-scoped publish/subscribe connection.
///
/// Publishing is fire-and-forget: while disconnected, publishes are dropped
/// and logged, never reported to the caller.
pub trait Transport: Send + 'static {
    /// Start connecting and deliver events on `events`; a no-op when already started.
    fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>);
    /// Subscribe to `topic`; duplicate subscriptions on one connection are ignored.
    fn subscribe(&mut self, topic: &str);
    /// Publish `message`, or drop it if not connected.
    fn publish(&mut self, message: Publish);
    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;
    /// Send `farewell` if possible, then tear the connection down for good.
    fn disconnect(&mut self, farewell: Option<Publish>);
}

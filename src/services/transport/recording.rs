use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::sync::mpsc;
use tracing::debug;

use super::{Transport, TransportEvent};
use crate::dto::frame::Publish;

#[derive(Debug, Default)]
struct Recorded {
    subscriptions: Vec<String>,
    published: Vec<Publish>,
    farewell: Option<Publish>,
    disconnected: bool,
    connect_calls: usize,
}

/// In-memory transport that records traffic and lets a probe drive events.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    shared: Arc<Shared>,
    subscribed: HashSet<String>,
    subscribed_generation: usize,
    started: bool,
}

#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    /// Bumped on every simulated connection.
    generation: AtomicUsize,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    recorded: Mutex<Recorded>,
}

/// Test-side handle paired with a [`RecordingTransport`].
#[derive(Debug, Clone)]
pub struct TransportProbe {
    shared: Arc<Shared>,
}

impl RecordingTransport {
    /// Create a transport and the probe observing it.
    pub fn new() -> (Self, TransportProbe) {
        let transport = Self::default();
        let probe = TransportProbe {
            shared: transport.shared.clone(),
        };
        (transport, probe)
    }
}

impl Transport for RecordingTransport {
    fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>) {
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            recorded.connect_calls += 1;
        }
        if self.started {
            return;
        }
        self.started = true;
        if let Ok(mut slot) = self.shared.events.lock() {
            *slot = Some(events);
        }
    }

    fn subscribe(&mut self, topic: &str) {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        if generation != self.subscribed_generation {
            self.subscribed.clear();
            self.subscribed_generation = generation;
        }
        if !self.subscribed.insert(topic.to_string()) {
            return;
        }
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            recorded.subscriptions.push(topic.to_string());
        }
    }

    fn publish(&mut self, message: Publish) {
        if !self.is_connected() {
            debug!(destination = %message.destination, "dropping publish while disconnected");
            return;
        }
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            recorded.published.push(message);
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&mut self, farewell: Option<Publish>) {
        if let Ok(mut recorded) = self.shared.recorded.lock() {
            if self.shared.connected.load(Ordering::SeqCst) {
                recorded.farewell = farewell;
            }
            recorded.disconnected = true;
        }
        self.shared.connected.store(false, Ordering::SeqCst);
    }
}

impl TransportProbe {
    /// Simulate an established connection.
    pub fn connect(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);
        self.emit(TransportEvent::Connected);
    }

    /// Simulate a dropped connection.
    pub fn drop_connection(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
        self.emit(TransportEvent::Disconnected);
    }

    /// Deliver a broadcast on `topic`.
    pub fn deliver(&self, topic: &str, body: &str) {
        self.emit(TransportEvent::Message {
            topic: topic.to_string(),
            body: body.to_string(),
        });
    }

    /// Close the event channel, as if the transport task died.
    pub fn close_events(&self) {
        if let Ok(mut slot) = self.shared.events.lock() {
            slot.take();
        }
    }

    /// Topics subscribed so far, in order.
    pub fn subscriptions(&self) -> Vec<String> {
        self.with_recorded(|r| r.subscriptions.clone())
    }

    /// Every publish sent while connected.
    pub fn published(&self) -> Vec<Publish> {
        self.with_recorded(|r| r.published.clone())
    }

    /// Publishes sent to destinations ending with `suffix`.
    pub fn published_to(&self, suffix: &str) -> Vec<Publish> {
        self.with_recorded(|r| {
            r.published
                .iter()
                .filter(|p| p.destination.ends_with(suffix))
                .cloned()
                .collect()
        })
    }

    /// Farewell handed to `disconnect` while connected, if any.
    pub fn farewell(&self) -> Option<Publish> {
        self.with_recorded(|r| r.farewell.clone())
    }

    /// Whether `disconnect` was called.
    pub fn is_disconnected(&self) -> bool {
        self.with_recorded(|r| r.disconnected)
    }

    /// Number of `connect` calls.
    pub fn connect_calls(&self) -> usize {
        self.with_recorded(|r| r.connect_calls)
    }

    fn emit(&self, event: TransportEvent) {
        if let Ok(slot) = self.shared.events.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(event);
            }
        }
    }

    fn with_recorded<T: Default>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        self.shared
            .recorded
            .lock()
            .map(|recorded| f(&recorded))
            .unwrap_or_default()
    }
}

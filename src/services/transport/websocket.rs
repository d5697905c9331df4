use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashSet;
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::sleep,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};
use tracing::{debug, info, warn};

use super::{Transport, TransportEvent};
use crate::{
    dto::frame::{ClientFrame, Publish, ServerFrame},
    error::TransportError,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Commands queued for the connection task.
#[derive(Debug)]
enum Outbound {
    Frame(ClientFrame),
    Close,
}

/// WebSocket transport that keeps reconnecting after a fixed delay.
pub struct WsTransport {
    url: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    /// Topics subscribed on the current connection; cleared on every reconnect.
    subscriptions: Arc<DashSet<String>>,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// Prepare a transport for `url`; nothing is opened until [`Transport::connect`].
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Result<Self, TransportError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(url));
        }

        Ok(Self {
            url,
            reconnect_delay,
            connected: Arc::new(AtomicBool::new(false)),
            subscriptions: Arc::new(DashSet::new()),
            outbound: None,
            task: None,
        })
    }

    fn send(&self, frame: ClientFrame) {
        if let Some(tx) = self.outbound.as_ref() {
            let _ = tx.send(Outbound::Frame(frame));
        }
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, events: mpsc::UnboundedSender<TransportEvent>) {
        if self.task.is_some() {
            debug!(url = %self.url, "transport already started");
            return;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);
        self.task = Some(tokio::spawn(run_connection(
            self.url.clone(),
            self.reconnect_delay,
            self.connected.clone(),
            self.subscriptions.clone(),
            rx,
            events,
        )));
    }

    fn subscribe(&mut self, topic: &str) {
        if !self.is_connected() {
            debug!(topic, "cannot subscribe while disconnected");
            return;
        }
        if !self.subscriptions.insert(topic.to_string()) {
            return;
        }
        self.send(ClientFrame::Subscribe {
            topic: topic.to_string(),
        });
    }

    fn publish(&mut self, message: Publish) {
        if !self.is_connected() {
            debug!(destination = %message.destination, "dropping publish while disconnected");
            return;
        }
        self.send(message.into());
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnect(&mut self, farewell: Option<Publish>) {
        if let Some(tx) = self.outbound.take() {
            if let Some(farewell) = farewell.filter(|_| self.is_connected()) {
                let _ = tx.send(Outbound::Frame(farewell.into()));
            }
            let _ = tx.send(Outbound::Close);
        }
        // The task flushes the queue, closes the socket and exits on its own.
        self.task.take();
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Keep a connection to the relay open until the transport is closed.
async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<DashSet<String>>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    loop {
        let attempt = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = wait_for_close(&mut outbound) => return,
        };

        match attempt {
            Ok((stream, _)) => {
                subscriptions.clear();
                connected.store(true, Ordering::SeqCst);
                info!(%url, "connected to relay");
                if events.send(TransportEvent::Connected).is_err() {
                    return;
                }

                let closing = pump(stream, &mut outbound, &events).await;

                connected.store(false, Ordering::SeqCst);
                subscriptions.clear();
                let _ = events.send(TransportEvent::Disconnected);
                if closing {
                    info!(%url, "relay connection closed");
                    return;
                }
                warn!(
                    %url,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "relay connection lost; reconnecting"
                );
            }
            Err(source) => {
                let err = TransportError::Connect {
                    url: url.clone(),
                    source,
                };
                warn!(
                    error = %err,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "relay connection attempt failed"
                );
            }
        }

        tokio::select! {
            _ = sleep(reconnect_delay) => {}
            _ = wait_for_close(&mut outbound) => return,
        }
    }
}

/// Shuttle frames both ways; returns true when the transport asked to close.
async fn pump(
    stream: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &mpsc::UnboundedSender<TransportEvent>,
) -> bool {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(error = %TransportError::Encode(err), "dropping outbound frame");
                            continue;
                        }
                    };
                    if let Err(err) = sink.send(Message::Text(text.into())).await {
                        warn!(error = %TransportError::Socket(err), "failed to send frame");
                        return false;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return true;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => match ServerFrame::from_json_str(&text) {
                    Ok(ServerFrame::Message { topic, body }) => {
                        if events.send(TransportEvent::Message { topic, body }).is_err() {
                            return true;
                        }
                    }
                    Err(err) => warn!(error = %err, "dropping malformed relay frame"),
                },
                Some(Ok(Message::Close(_))) | None => return false,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(error = %TransportError::Socket(err), "relay socket failed");
                    return false;
                }
            },
        }
    }
}

/// Resolve once the transport is closed, discarding frames queued meanwhile.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    loop {
        match outbound.recv().await {
            Some(Outbound::Frame(frame)) => {
                debug!(?frame, "dropping frame queued while disconnected");
            }
            Some(Outbound::Close) | None => return,
        }
    }
}

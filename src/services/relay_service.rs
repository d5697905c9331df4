use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        frame::{ClientFrame, ServerFrame},
        room::{
            ChatBroadcastPayload, PlaybackPositionPayload, ReadinessStatePayload,
            RoomEventPayload, SendChatPayload, ShareTimePayload,
        },
        topics::{self, RoomAction},
    },
    state::{SharedState, chat::outbound_content},
};

/// Reasons a frame from a participant socket is ignored.
#[derive(Debug, Error)]
enum RelayError {
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),
    #[error("unknown destination `{0}`")]
    UnknownDestination(String),
    #[error("invalid payload for `{destination}`: {source}")]
    Payload {
        destination: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload for room `{got}` sent to room `{expected}`")]
    MismatchedRoom { expected: String, got: String },
    #[error("`{sender}` has not joined room `{room_id}` on this connection")]
    NotMember { room_id: String, sender: String },
    #[error("only the host of room `{room_id}` may share time")]
    NotHost { room_id: String },
}

/// Handle the full lifecycle of a participant WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps broadcasts flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = state.register_connection(outbound_tx.clone());
    info!(%connection_id, "participant connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%connection_id, payload = %text, "received frame");
                if let Err(err) = handle_frame(&state, connection_id, &text) {
                    warn!(%connection_id, error = %err, "ignoring frame");
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "participant closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    disconnect(&state, connection_id);
    info!(%connection_id, "participant disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Leave every room the socket still had joined and forget it.
fn disconnect(state: &SharedState, connection_id: Uuid) {
    for (room_id, username) in state.remove_connection(connection_id) {
        // A reconnected socket may already have joined under the same name.
        if state.joined_elsewhere(connection_id, &room_id, &username) {
            continue;
        }
        let changed = state.room_mut(&room_id).leave(&username);
        if changed {
            info!(room = %room_id, user = %username, "participant dropped from room");
            broadcast_snapshot(state, &room_id);
        }
        if state.prune_room(&room_id) {
            debug!(room = %room_id, "empty room removed");
        }
    }
}

fn handle_frame(state: &SharedState, connection_id: Uuid, text: &str) -> Result<(), RelayError> {
    match ClientFrame::from_json_str(text)? {
        ClientFrame::Subscribe { topic } => {
            if state.subscribe(connection_id, &topic) {
                debug!(%connection_id, %topic, "subscribed");
            }
            Ok(())
        }
        ClientFrame::Send { destination, body } => {
            let (room_id, action) = topics::parse_destination(&destination)
                .ok_or_else(|| RelayError::UnknownDestination(destination.clone()))?;

            match action {
                RoomAction::Join
                | RoomAction::Leave
                | RoomAction::Ready
                | RoomAction::NotReady => {
                    let event: RoomEventPayload = decode(&destination, &body)?;
                    ensure_room(room_id, &event.room_id)?;
                    handle_room_event(state, connection_id, room_id, action, &event.sender)
                }
                RoomAction::ShareTime => {
                    let payload: ShareTimePayload = decode(&destination, &body)?;
                    ensure_room(room_id, &payload.room_id)?;
                    handle_share_time(state, connection_id, room_id, payload.current_time)
                }
                RoomAction::Chat => {
                    let payload: SendChatPayload = decode(&destination, &body)?;
                    ensure_room(room_id, &payload.room_id)?;
                    handle_chat(state, connection_id, room_id, payload)
                }
            }
        }
    }
}

fn handle_room_event(
    state: &SharedState,
    connection_id: Uuid,
    room_id: &str,
    action: RoomAction,
    sender: &str,
) -> Result<(), RelayError> {
    if action == RoomAction::Join {
        if let Some(previous) = state.membership(connection_id, room_id) {
            if previous != sender {
                state.room_mut(room_id).leave(&previous);
            }
        }
        state.room_mut(room_id).join(sender);
        state.record_membership(connection_id, room_id, sender);
        info!(room = %room_id, user = %sender, "participant joined");
        broadcast_snapshot(state, room_id);
        return Ok(());
    }

    ensure_member(state, connection_id, room_id, sender)?;

    let changed = match action {
        RoomAction::Leave => {
            state.forget_membership(connection_id, room_id);
            if state.joined_elsewhere(connection_id, room_id, sender) {
                false
            } else {
                info!(room = %room_id, user = %sender, "participant left");
                state.room_mut(room_id).leave(sender)
            }
        }
        RoomAction::Ready => state.room_mut(room_id).set_ready(sender, true),
        RoomAction::NotReady => state.room_mut(room_id).set_ready(sender, false),
        _ => false,
    };

    if changed {
        broadcast_snapshot(state, room_id);
    }
    if action == RoomAction::Leave && state.prune_room(room_id) {
        debug!(room = %room_id, "empty room removed");
    }
    Ok(())
}

fn handle_share_time(
    state: &SharedState,
    connection_id: Uuid,
    room_id: &str,
    current_time: f64,
) -> Result<(), RelayError> {
    let host = state.read_room(room_id, |room| room.host().map(str::to_string));
    let is_host = match (state.membership(connection_id, room_id), host.flatten()) {
        (Some(member), Some(host)) => member == host,
        _ => false,
    };
    if !is_host {
        return Err(RelayError::NotHost {
            room_id: room_id.to_string(),
        });
    }

    info!(room = %room_id, current_time, "host shared playback position");
    broadcast(
        state,
        topics::time_topic(room_id),
        &PlaybackPositionPayload { current_time },
    )
}

fn handle_chat(
    state: &SharedState,
    connection_id: Uuid,
    room_id: &str,
    payload: SendChatPayload,
) -> Result<(), RelayError> {
    ensure_member(state, connection_id, room_id, &payload.sender)?;

    let Some(content) = outbound_content(&payload.content) else {
        debug!(room = %room_id, sender = %payload.sender, "dropping blank chat message");
        return Ok(());
    };

    broadcast(
        state,
        topics::chat_topic(room_id),
        &ChatBroadcastPayload {
            sender: payload.sender.clone(),
            content: content.to_string(),
        },
    )
}

fn broadcast_snapshot(state: &SharedState, room_id: &str) {
    let Some(payload) = state.read_room(room_id, |room| ReadinessStatePayload::from(&room.snapshot()))
    else {
        return;
    };
    if let Err(err) = broadcast(state, topics::state_topic(room_id), &payload) {
        warn!(room = %room_id, error = %err, "failed to broadcast readiness snapshot");
    }
}

/// Wrap `payload` in a message frame and push it to every subscriber of `topic`.
fn broadcast<T: Serialize>(state: &SharedState, topic: String, payload: &T) -> Result<(), RelayError> {
    let body = serde_json::to_string(payload)?;
    let frame = serde_json::to_string(&ServerFrame::Message {
        topic: topic.clone(),
        body,
    })?;
    state.broadcast(&topic, &frame);
    Ok(())
}

fn decode<T: DeserializeOwned>(destination: &str, body: &str) -> Result<T, RelayError> {
    serde_json::from_str(body).map_err(|source| RelayError::Payload {
        destination: destination.to_string(),
        source,
    })
}

fn ensure_room(expected: &str, got: &str) -> Result<(), RelayError> {
    if expected == got {
        Ok(())
    } else {
        Err(RelayError::MismatchedRoom {
            expected: expected.to_string(),
            got: got.to_string(),
        })
    }
}

fn ensure_member(
    state: &SharedState,
    connection_id: Uuid,
    room_id: &str,
    sender: &str,
) -> Result<(), RelayError> {
    match state.membership(connection_id, room_id) {
        Some(member) if member == sender => Ok(()),
        _ => Err(RelayError::NotMember {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
        }),
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

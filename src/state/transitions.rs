//! Pure session transitions: each input mutates [`SessionState`] and yields the
//! side effects the controller must carry out.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        frame::Publish,
        room::{RoomEventPayload, SendChatPayload, ShareTimePayload},
        topics::{self, RoomAction},
    },
    state::{
        chat::outbound_content,
        countdown::CountdownStep,
        readiness::ReadinessSnapshot,
        session::SessionState,
        sync::{TimeSyncEvent, sync_indicator},
    },
};

/// Kinds of cancellable timers; at most one of each is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Next countdown step.
    CountdownTick,
    /// Hides the "no longer ready" notice.
    ReadyNotice,
    /// Hides the "synced to" indicator.
    SyncIndicator,
    /// Unlocks the ready toggle.
    ToggleCooldown,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Subscribe the transport to a topic.
    Subscribe(String),
    /// Send a record to a destination.
    Publish(Publish),
    /// Publish the local playback position on the share-time destination.
    ShareCurrentTime,
    /// Move the player to a position in seconds.
    Seek(f64),
    /// Resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Start (or restart) a timer of this kind.
    Schedule(TimerKind, Duration),
    /// Cancel the pending timer of this kind, if any.
    Cancel(TimerKind),
}

/// Everything that can happen to a session, in handling order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// The transport connected (or reconnected).
    Connected,
    /// The transport lost its connection.
    Disconnected,
    /// A readiness snapshot arrived.
    Readiness(ReadinessSnapshot),
    /// The host shared its playback position.
    TimeSync(TimeSyncEvent),
    /// A chat message arrived.
    Chat { sender: String, content: String },
    /// A scheduled timer elapsed.
    TimerFired(TimerKind),
    /// The viewer toggled the ready flag.
    ToggleReady,
    /// The viewer wants to send a chat message.
    SendChat(String),
}

/// Apply `input` to `state`, returning the effects to execute in order.
pub fn apply(state: &mut SessionState, input: SessionInput) -> Vec<Effect> {
    match input {
        SessionInput::Connected => on_connected(state),
        SessionInput::Disconnected => on_disconnected(state),
        SessionInput::Readiness(snapshot) => on_readiness(state, snapshot),
        SessionInput::TimeSync(event) => on_time_sync(state, event),
        SessionInput::Chat { sender, content } => {
            state.chat.push(sender, content);
            Vec::new()
        }
        SessionInput::TimerFired(kind) => on_timer(state, kind),
        SessionInput::ToggleReady => on_toggle_ready(state),
        SessionInput::SendChat(content) => on_send_chat(state, &content),
    }
}

fn on_connected(state: &mut SessionState) -> Vec<Effect> {
    state.connected = true;
    let mut effects = Vec::new();

    if !state.subscribed {
        effects.extend(state.topics().into_iter().map(Effect::Subscribe));
        state.subscribed = true;
    }

    if !state.joined {
        effects.extend(room_event(state, RoomAction::Join));
        state.joined = true;
        info!(room = %state.room_id, user = %state.username, "joined room");
    }

    effects
}

fn on_disconnected(state: &mut SessionState) -> Vec<Effect> {
    // The next connection is a new lifetime: subscribe and join again.
    state.connected = false;
    state.subscribed = false;
    state.joined = false;

    // A reconnect resumes from the next snapshot, not a countdown left running offline.
    state.countdown_label = None;
    if state.countdown.is_active() {
        info!(room = %state.room_id, "connection lost; countdown aborted");
        state.countdown.reset();
        return vec![Effect::Cancel(TimerKind::CountdownTick)];
    }
    Vec::new()
}

fn on_readiness(state: &mut SessionState, snapshot: ReadinessSnapshot) -> Vec<Effect> {
    let mut effects = Vec::new();
    let update = state.readiness.apply(snapshot, &state.username);

    if let Some(ready) = update.local_ready {
        state.local_ready = ready;
    }

    if let Some(username) = update.dropped {
        state.ready_notice = Some(format!("{username} is no longer ready"));
        effects.push(Effect::Schedule(
            TimerKind::ReadyNotice,
            state.timings.ready_notice,
        ));
    }

    match state.countdown.observe(update.all_ready) {
        CountdownStep::Started(n) => {
            info!(room = %state.room_id, from = n, "everyone is ready; countdown started");
            state.countdown_label = Some(n.to_string());
            effects.push(Effect::Schedule(
                TimerKind::CountdownTick,
                state.timings.countdown_tick,
            ));
        }
        CountdownStep::Aborted => {
            info!(room = %state.room_id, "countdown aborted");
            state.countdown_label = None;
            effects.push(Effect::Cancel(TimerKind::CountdownTick));
            effects.push(Effect::Pause);
        }
        _ if !update.all_ready => state.countdown_label = None,
        _ => {}
    }

    effects
}

fn on_time_sync(state: &mut SessionState, event: TimeSyncEvent) -> Vec<Effect> {
    state.sync_indicator = Some(sync_indicator(event.current_time));
    vec![
        Effect::Seek(event.current_time),
        Effect::Play,
        Effect::Schedule(TimerKind::SyncIndicator, state.timings.sync_indicator),
    ]
}

fn on_timer(state: &mut SessionState, kind: TimerKind) -> Vec<Effect> {
    match kind {
        TimerKind::CountdownTick => match state.countdown.tick() {
            CountdownStep::Counted(n) => {
                state.countdown_label = Some(n.to_string());
                vec![Effect::Schedule(
                    TimerKind::CountdownTick,
                    state.timings.countdown_tick,
                )]
            }
            CountdownStep::Fired => {
                state.countdown_label = Some("Go".to_string());
                let host = state.is_host();
                info!(room = %state.room_id, host, "countdown fired");
                if host {
                    vec![Effect::ShareCurrentTime]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        },
        TimerKind::ReadyNotice => {
            state.ready_notice = None;
            Vec::new()
        }
        TimerKind::SyncIndicator => {
            state.sync_indicator = None;
            Vec::new()
        }
        TimerKind::ToggleCooldown => {
            state.toggle_locked = false;
            Vec::new()
        }
    }
}

fn on_toggle_ready(state: &mut SessionState) -> Vec<Effect> {
    if state.toggle_locked {
        debug!(room = %state.room_id, "ignoring ready toggle during cooldown");
        return Vec::new();
    }

    state.toggle_locked = true;
    state.local_ready = !state.local_ready;

    let mut effects = vec![Effect::Schedule(
        TimerKind::ToggleCooldown,
        state.timings.toggle_cooldown,
    )];

    if state.local_ready {
        effects.extend(room_event(state, RoomAction::Ready));
    } else {
        effects.extend(room_event(state, RoomAction::NotReady));
        state.countdown.reset();
        state.countdown_label = None;
        effects.push(Effect::Cancel(TimerKind::CountdownTick));
        effects.push(Effect::Pause);
    }

    effects
}

fn on_send_chat(state: &mut SessionState, content: &str) -> Vec<Effect> {
    let Some(content) = outbound_content(content) else {
        debug!(room = %state.room_id, "dropping blank chat message");
        return Vec::new();
    };

    let payload = SendChatPayload {
        room_id: state.room_id.clone(),
        sender: state.username.clone(),
        content: content.to_string(),
    };
    publish(topics::destination(&state.room_id, RoomAction::Chat), &payload)
        .into_iter()
        .collect()
}

/// Build the host's share-time publish for the given playback position.
pub fn share_time(state: &SessionState, current_time: f64) -> Option<Publish> {
    let payload = ShareTimePayload {
        room_id: state.room_id.clone(),
        current_time,
    };
    match Publish::json(
        topics::destination(&state.room_id, RoomAction::ShareTime),
        &payload,
    ) {
        Ok(publish) => Some(publish),
        Err(err) => {
            warn!(error = %err, "failed to encode share-time payload");
            None
        }
    }
}

/// Leave notification sent once on teardown, only while still connected.
pub fn farewell(state: &mut SessionState) -> Option<Publish> {
    if !state.connected || !state.joined || state.left {
        return None;
    }
    state.left = true;
    info!(room = %state.room_id, user = %state.username, "leaving room");
    match room_event(state, RoomAction::Leave) {
        Some(Effect::Publish(publish)) => Some(publish),
        _ => None,
    }
}

fn room_event(state: &SessionState, action: RoomAction) -> Option<Effect> {
    let payload = RoomEventPayload {
        room_id: state.room_id.clone(),
        sender: state.username.clone(),
    };
    publish(topics::destination(&state.room_id, action), &payload)
}

fn publish<T: Serialize>(destination: String, payload: &T) -> Option<Effect> {
    match Publish::json(destination, payload) {
        Ok(publish) => Some(Effect::Publish(publish)),
        Err(err) => {
            warn!(error = %err, "failed to encode outbound payload");
            None
        }
    }
}

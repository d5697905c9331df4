use crate::{
    config::SessionTimings,
    dto::topics,
    state::{
        chat::{ChatLog, ChatMessage},
        countdown::CountdownCoordinator,
        readiness::{Participant, ReadinessTracker},
    },
};

/// Session-scoped state owned by the lobby controller.
///
/// Everything the engine remembers about a room lives here: connection
/// lifetime flags, the latest snapshot, the countdown and the transient
/// indicators shown to the local viewer.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) room_id: String,
    pub(crate) username: String,
    pub(crate) timings: SessionTimings,
    pub(crate) connected: bool,
    pub(crate) subscribed: bool,
    pub(crate) joined: bool,
    pub(crate) left: bool,
    pub(crate) local_ready: bool,
    pub(crate) toggle_locked: bool,
    pub(crate) readiness: ReadinessTracker,
    pub(crate) countdown: CountdownCoordinator,
    pub(crate) chat: ChatLog,
    pub(crate) countdown_label: Option<String>,
    pub(crate) ready_notice: Option<String>,
    pub(crate) sync_indicator: Option<String>,
}

impl SessionState {
    /// Fresh state for `username` inside `room_id`.
    pub fn new(
        room_id: impl Into<String>,
        username: impl Into<String>,
        timings: SessionTimings,
    ) -> Self {
        let countdown = CountdownCoordinator::new(timings.countdown_from);
        Self {
            room_id: room_id.into(),
            username: username.into(),
            timings,
            connected: false,
            subscribed: false,
            joined: false,
            left: false,
            local_ready: false,
            toggle_locked: false,
            readiness: ReadinessTracker::new(),
            countdown,
            chat: ChatLog::default(),
            countdown_label: None,
            ready_notice: None,
            sync_indicator: None,
        }
    }

    /// Room this session is bound to.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Local participant's name.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the latest snapshot names the local participant as host.
    pub fn is_host(&self) -> bool {
        self.readiness.host() == Some(self.username.as_str())
    }

    /// The three broadcast topics the session listens to.
    pub fn topics(&self) -> [String; 3] {
        [
            topics::state_topic(&self.room_id),
            topics::time_topic(&self.room_id),
            topics::chat_topic(&self.room_id),
        ]
    }

    /// Read-only projection handed to observers.
    pub fn view(&self) -> SessionView {
        let snapshot = self.readiness.current();
        SessionView {
            room_id: self.room_id.clone(),
            username: self.username.clone(),
            connected: self.connected,
            host: snapshot.map(|s| s.host_username.clone()),
            is_host: self.is_host(),
            local_ready: self.local_ready,
            participants: snapshot
                .map(|s| s.participants.clone())
                .unwrap_or_default(),
            countdown: self.countdown_label.clone(),
            ready_notice: self.ready_notice.clone(),
            sync_indicator: self.sync_indicator.clone(),
            chat: self.chat.messages().to_vec(),
        }
    }
}

/// Snapshot of a session as seen by a UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Room the session belongs to.
    pub room_id: String,
    /// Local participant.
    pub username: String,
    /// Whether the transport is currently connected.
    pub connected: bool,
    /// Host named by the latest snapshot.
    pub host: Option<String>,
    /// Whether the local participant is the host.
    pub is_host: bool,
    /// Local ready flag.
    pub local_ready: bool,
    /// Members in join order, as of the latest snapshot.
    pub participants: Vec<Participant>,
    /// "3", "2", "1" while counting, "Go" once fired.
    pub countdown: Option<String>,
    /// "X is no longer ready", while its timer runs.
    pub ready_notice: Option<String>,
    /// "synced to HH:MM:SS", while its timer runs.
    pub sync_indicator: Option<String>,
    /// Chat history in arrival order.
    pub chat: Vec<ChatMessage>,
}

//! Room session controller: owns the session state and runs every inbound
//! event, timer expiry and local command through one sequential loop.

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use crate::{
    config::SessionTimings,
    error::SessionError,
    services::{
        dispatch::DispatchTable,
        player::Player,
        timers::{TimerFired, Timers},
        transport::{Transport, TransportEvent},
    },
    state::{
        SessionState, SessionView,
        chat::outbound_content,
        transitions::{self, Effect, SessionInput},
    },
};

/// Local actions requested through a [`LobbyHandle`].
#[derive(Debug)]
enum Command {
    ToggleReady,
    SendChat(String),
    Leave,
}

/// Caller-side handle of a running room session.
///
/// Dropping the handle tears the session down like [`LobbyHandle::leave`].
pub struct LobbyHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    task: Option<JoinHandle<()>>,
}

impl LobbyHandle {
    /// Flip the local ready flag; repeated calls inside the cooldown are ignored.
    pub fn toggle_ready(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::ToggleReady)
            .map_err(|_| SessionError::Closed)
    }

    /// Publish a chat message; blank text is rejected locally.
    pub fn send_chat(&self, content: &str) -> Result<(), SessionError> {
        let content = outbound_content(content).ok_or(SessionError::EmptyMessage)?;
        self.commands
            .send(Command::SendChat(content.to_string()))
            .map_err(|_| SessionError::Closed)
    }

    /// Latest view of the session.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified after every handled event.
    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Stream of session views, starting with the current one.
    pub fn updates(&self) -> WatchStream<SessionView> {
        WatchStream::new(self.view.clone())
    }

    /// Leave the room and wait until teardown completed.
    pub async fn leave(mut self) {
        let _ = self.commands.send(Command::Leave);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "session task ended abnormally");
            }
        }
    }
}

/// Start a session for `username` in `room_id` and return its handle.
pub fn join<T, P>(
    room_id: impl Into<String>,
    username: impl Into<String>,
    timings: SessionTimings,
    transport: T,
    player: P,
) -> LobbyHandle
where
    T: Transport,
    P: Player,
{
    let state = SessionState::new(room_id, username, timings);
    let (view_tx, view_rx) = watch::channel(state.view());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let session = LobbySession {
        dispatch: DispatchTable::for_room(state.room_id()),
        state,
        transport,
        player,
        timers: Timers::new(timer_tx),
        view: view_tx,
        torn_down: false,
    };

    LobbyHandle {
        commands: command_tx,
        view: view_rx,
        task: Some(tokio::spawn(session.run(command_rx, timer_rx))),
    }
}

struct LobbySession<T: Transport, P: Player> {
    state: SessionState,
    dispatch: DispatchTable,
    transport: T,
    player: P,
    timers: Timers,
    view: watch::Sender<SessionView>,
    torn_down: bool,
}

impl<T: Transport, P: Player> LobbySession<T, P> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut timers: mpsc::UnboundedReceiver<TimerFired>,
    ) {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        self.transport.connect(events_tx);

        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::ToggleReady) => SessionInput::ToggleReady,
                    Some(Command::SendChat(content)) => SessionInput::SendChat(content),
                    Some(Command::Leave) | None => break,
                },
                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => SessionInput::Connected,
                    Some(TransportEvent::Disconnected) => SessionInput::Disconnected,
                    Some(TransportEvent::Message { topic, body }) => {
                        match self.dispatch.decode(&topic, &body) {
                            Ok(input) => input,
                            Err(err) => {
                                warn!(room = %self.state.room_id(), %topic, error = %err, "dropping inbound message");
                                continue;
                            }
                        }
                    }
                    None => {
                        warn!(room = %self.state.room_id(), "transport event stream ended");
                        break;
                    }
                },
                Some(fired) = timers.recv() => {
                    if !self.timers.accept(fired) {
                        continue;
                    }
                    SessionInput::TimerFired(fired.kind)
                }
            };

            self.handle(input);
        }

        self.teardown();
    }

    fn handle(&mut self, input: SessionInput) {
        let effects = transitions::apply(&mut self.state, input);
        for effect in effects {
            self.execute(effect);
        }
        self.view.send_replace(self.state.view());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Subscribe(topic) => self.transport.subscribe(&topic),
            Effect::Publish(message) => self.transport.publish(message),
            Effect::ShareCurrentTime => {
                let position = self.player.current_time();
                info!(room = %self.state.room_id(), position, "sharing host position");
                if let Some(message) = transitions::share_time(&self.state, position) {
                    self.transport.publish(message);
                }
            }
            Effect::Seek(position) => self.player.seek(position),
            Effect::Play => self.player.play(),
            Effect::Pause => self.player.pause(),
            Effect::Schedule(kind, after) => self.timers.schedule(kind, after),
            Effect::Cancel(kind) => self.timers.cancel(kind),
        }
    }

    /// Best-effort leave, cancel timers and release the transport. Runs once.
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let farewell = transitions::farewell(&mut self.state);
        self.timers.cancel_all();
        self.transport.disconnect(farewell);
        self.state.connected = false;
        self.view.send_replace(self.state.view());
        info!(room = %self.state.room_id(), "session closed");
    }
}

impl<T: Transport, P: Player> Drop for LobbySession<T, P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio::time::sleep;

    use super::*;
    use crate::services::{
        player::ClockPlayer,
        transport::{RecordingTransport, TransportProbe},
    };

    /// Player shared between the session and the test body.
    #[derive(Clone)]
    struct SharedPlayer(Arc<Mutex<ClockPlayer>>);

    impl SharedPlayer {
        fn new(position: f64) -> Self {
            let mut player = ClockPlayer::new(None);
            player.seek(position);
            Self(Arc::new(Mutex::new(player)))
        }

        fn with<R>(&self, f: impl FnOnce(&mut ClockPlayer) -> R) -> R {
            let mut player = self.0.lock().unwrap();
            f(&mut *player)
        }
    }

    impl Player for SharedPlayer {
        fn current_time(&self) -> f64 {
            self.with(|p| p.current_time())
        }
        fn seek(&mut self, position: f64) {
            self.with(|p| p.seek(position))
        }
        fn play(&mut self) {
            self.with(|p| p.play())
        }
        fn pause(&mut self) {
            self.with(|p| p.pause())
        }
        fn is_paused(&self) -> bool {
            self.with(|p| p.is_paused())
        }
    }

    const STATE: &str = "/topic/room/r1/state";
    const TIME: &str = "/topic/room/r1/time";
    const CHAT: &str = "/topic/room/r1/chat";

    /// Let the session loop drain everything queued so far.
    async fn settle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn start(user: &str, player: SharedPlayer) -> (LobbyHandle, TransportProbe) {
        let (transport, probe) = RecordingTransport::new();
        let handle = join("r1", user, SessionTimings::default(), transport, player);
        (handle, probe)
    }

    async fn connected(user: &str, player: SharedPlayer) -> (LobbyHandle, TransportProbe) {
        let (handle, probe) = start(user, player);
        settle().await;
        probe.connect();
        settle().await;
        (handle, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn joins_once_per_connection_lifetime() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        assert_eq!(probe.connect_calls(), 1);
        assert_eq!(probe.subscriptions(), vec![STATE, TIME, CHAT]);
        assert_eq!(probe.published_to("/join").len(), 1);
        assert!(handle.view().connected);

        probe.drop_connection();
        settle().await;
        assert!(!handle.view().connected);
        probe.connect();
        settle().await;

        assert_eq!(probe.subscriptions().len(), 6);
        assert_eq!(probe.published_to("/join").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn host_shares_position_after_three_ticks() {
        let player = SharedPlayer::new(42.0);
        let (handle, probe) = connected("A", player.clone()).await;

        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":true},{"username":"B","ready":false}],"hostUsername":"A"}"#,
        );
        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":true},{"username":"B","ready":true}],"hostUsername":"A"}"#,
        );
        settle().await;
        assert_eq!(handle.view().countdown.as_deref(), Some("3"));

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(handle.view().countdown.as_deref(), Some("1"));
        assert!(probe.published_to("/share-time").is_empty());

        sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.view().countdown.as_deref(), Some("Go"));
        let shared = probe.published_to("/share-time");
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].body, r#"{"roomId":"r1","currentTime":42.0}"#);

        // Duplicate all-ready snapshots never re-arm.
        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":true},{"username":"B","ready":true}],"hostUsername":"A"}"#,
        );
        sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.published_to("/share-time").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn guest_fire_publishes_nothing() {
        let (handle, probe) = connected("B", SharedPlayer::new(10.0)).await;

        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":true},{"username":"B","ready":true}],"hostUsername":"A"}"#,
        );
        sleep(Duration::from_secs(4)).await;

        assert_eq!(handle.view().countdown.as_deref(), Some("Go"));
        assert!(probe.published_to("/share-time").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_snapshot_aborts_countdown_and_pauses() {
        let mut player = SharedPlayer::new(0.0);
        player.play();
        let (handle, probe) = connected("B", player.clone()).await;

        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":true},{"username":"B","ready":true}],"hostUsername":"A"}"#,
        );
        sleep(Duration::from_millis(1_500)).await;
        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":false},{"username":"B","ready":true}],"hostUsername":"A"}"#,
        );
        settle().await;

        let view = handle.view();
        assert_eq!(view.countdown, None);
        assert_eq!(view.ready_notice.as_deref(), Some("A is no longer ready"));
        assert!(player.is_paused());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.view().countdown, None);
        assert_eq!(handle.view().ready_notice, None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_drop_replaces_notice_and_restarts_its_timer() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":false},{"username":"B","ready":true},{"username":"C","ready":true}],"hostUsername":"A"}"#,
        );
        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":false},{"username":"B","ready":false},{"username":"C","ready":true}],"hostUsername":"A"}"#,
        );
        sleep(Duration::from_millis(1_500)).await;
        probe.deliver(
            STATE,
            r#"{"participants":[{"username":"A","ready":false},{"username":"B","ready":false},{"username":"C","ready":false}],"hostUsername":"A"}"#,
        );
        settle().await;
        assert_eq!(
            handle.view().ready_notice.as_deref(),
            Some("C is no longer ready")
        );

        sleep(Duration::from_millis(1_000)).await;
        assert_eq!(
            handle.view().ready_notice.as_deref(),
            Some("C is no longer ready")
        );
        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(handle.view().ready_notice, None);
    }

    #[tokio::test(start_paused = true)]
    async fn time_sync_seeks_plays_and_clears_indicator() {
        let player = SharedPlayer::new(0.0);
        let (handle, probe) = connected("B", player.clone()).await;

        probe.deliver(TIME, r#"{"currentTime":125}"#);
        settle().await;

        assert!(!player.is_paused());
        assert!((player.current_time() - 125.0).abs() < 0.01);
        assert_eq!(
            handle.view().sync_indicator.as_deref(),
            Some("synced to 00:02:05")
        );

        sleep(Duration::from_millis(2_900)).await;
        assert!(handle.view().sync_indicator.is_some());
        sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.view().sync_indicator, None);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_twice_within_cooldown_publishes_once() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        handle.toggle_ready().unwrap();
        handle.toggle_ready().unwrap();
        settle().await;
        assert_eq!(probe.published_to("/ready").len(), 1);
        assert!(handle.view().local_ready);

        sleep(Duration::from_millis(3_100)).await;
        handle.toggle_ready().unwrap();
        settle().await;
        assert_eq!(probe.published_to("/not-ready").len(), 1);
        assert!(!handle.view().local_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_payloads_do_not_stop_the_session() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        probe.deliver(CHAT, "{oops");
        probe.deliver(TIME, r#"{"currentTime":"soon"}"#);
        probe.deliver("/topic/room/elsewhere/chat", r#"{"sender":"X","content":"hi"}"#);
        probe.deliver(CHAT, r#"{"sender":"B","content":"first"}"#);
        probe.deliver(CHAT, r#"{"sender":"A","content":"second"}"#);
        settle().await;

        let chat: Vec<_> = handle
            .view()
            .chat
            .into_iter()
            .map(|m| (m.sender, m.content))
            .collect();
        assert_eq!(
            chat,
            vec![
                ("B".to_string(), "first".to_string()),
                ("A".to_string(), "second".to_string())
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blank_chat_is_rejected_locally() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        assert_eq!(handle.send_chat("  "), Err(SessionError::EmptyMessage));
        handle.send_chat("hello").unwrap();
        settle().await;

        let sent = probe.published_to("/chat");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, r#"{"roomId":"r1","sender":"A","content":"hello"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_while_disconnected_are_dropped() {
        let (handle, probe) = start("A", SharedPlayer::new(0.0));
        settle().await;

        handle.toggle_ready().unwrap();
        settle().await;

        assert!(probe.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn leave_sends_farewell_once_and_disconnects() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        handle.leave().await;

        let farewell = probe.farewell().unwrap();
        assert_eq!(farewell.destination, "/app/room/r1/leave");
        assert!(probe.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_tears_down() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        drop(handle);
        settle().await;

        assert!(probe.farewell().is_some());
        assert!(probe.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn leave_without_connection_skips_farewell() {
        let (handle, probe) = start("A", SharedPlayer::new(0.0));
        settle().await;

        handle.leave().await;

        assert!(probe.farewell().is_none());
        assert!(probe.is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_transport_stream_tears_down() {
        let (handle, probe) = connected("A", SharedPlayer::new(0.0)).await;

        probe.close_events();
        settle().await;

        assert!(probe.is_disconnected());
        assert!(!handle.view().connected);
    }
}

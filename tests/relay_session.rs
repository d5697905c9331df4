//! End-to-end sessions against a relay bound to an ephemeral port.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{net::TcpListener, time::timeout};

use watchparty_sync::{
    config::{RetryPolicy, SessionTimings},
    dto::room::RoomSummary,
    services::{
        content_service::{ContentLoader, ContentState, RestContentResolver},
        lobby_service::{self, LobbyHandle},
        player::{ClockPlayer, Player},
        transport::WsTransport,
    },
    routes,
    state::{RelayState, SessionView},
};

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(RelayState::new());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });
    addr
}

fn timings() -> SessionTimings {
    SessionTimings {
        countdown_from: 3,
        countdown_tick: Duration::from_millis(50),
        ready_notice: Duration::from_millis(200),
        sync_indicator: Duration::from_secs(2),
        toggle_cooldown: Duration::from_millis(100),
    }
}

fn join(addr: SocketAddr, user: &str, position: f64) -> LobbyHandle {
    let transport =
        WsTransport::new(format!("ws://{addr}/ws"), Duration::from_millis(100)).unwrap();
    let mut player = ClockPlayer::new(None);
    player.seek(position);
    lobby_service::join("movie", user, timings(), transport, player)
}

async fn wait_for(handle: &LobbyHandle, what: &str, predicate: impl FnMut(&SessionView) -> bool) {
    let mut rx = handle.watch();
    timeout(WAIT, rx.wait_for(predicate))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap();
}

#[tokio::test]
async fn content_is_registered_and_resolved_over_rest() {
    let addr = spawn_relay().await;
    let base = format!("http://{addr}");
    let client = reqwest::Client::new();

    let missing = client.get(format!("{base}/rooms/movie")).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let rejected = client
        .put(format!("{base}/rooms/movie"))
        .json(&serde_json::json!({ "contentUri": "not a url" }))
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);

    let summary: RoomSummary = client
        .put(format!("{base}/rooms/movie"))
        .json(&serde_json::json!({ "contentUri": "https://cdn.example.com/movie.mp4" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.room_id, "movie");

    let resolver = RestContentResolver::new(&base).unwrap();
    let loader = ContentLoader::new(
        Arc::new(resolver),
        "movie",
        RetryPolicy {
            retries: 0,
            backoff: Duration::from_millis(10),
        },
    );
    let room = loader.load().await.unwrap();
    assert_eq!(room.content_uri, "https://cdn.example.com/movie.mp4");
    assert!(matches!(loader.state(), ContentState::Ready(_)));
}

#[tokio::test]
async fn everyone_ready_starts_playback_from_host_position() {
    let addr = spawn_relay().await;

    let host = join(addr, "A", 30.0);
    wait_for(&host, "host to join", |view| {
        view.connected && view.is_host
    })
    .await;

    let guest = join(addr, "B", 0.0);
    wait_for(&guest, "guest to see both members", |view| {
        view.participants.len() == 2
    })
    .await;
    assert_eq!(guest.view().host.as_deref(), Some("A"));
    assert!(!guest.view().is_host);

    host.toggle_ready().unwrap();
    guest.toggle_ready().unwrap();

    wait_for(&guest, "time sync from host", |view| {
        view.sync_indicator.as_deref() == Some("synced to 00:00:30")
    })
    .await;
    wait_for(&guest, "guest countdown to fire", |view| {
        view.countdown.as_deref() == Some("Go")
    })
    .await;

    guest.send_chat("  popcorn ready  ").unwrap();
    wait_for(&host, "chat from guest", |view| {
        view.chat
            .iter()
            .any(|m| m.sender == "B" && m.content == "popcorn ready")
    })
    .await;

    guest.leave().await;
    wait_for(&host, "guest to leave", |view| view.participants.len() == 1).await;

    host.leave().await;
}

#[tokio::test]
async fn not_ready_aborts_and_host_leaving_promotes_guest() {
    let addr = spawn_relay().await;

    let host = join(addr, "A", 5.0);
    wait_for(&host, "host to join", |view| view.is_host).await;
    let guest = join(addr, "B", 0.0);
    wait_for(&host, "guest to join", |view| view.participants.len() == 2).await;

    host.toggle_ready().unwrap();
    wait_for(&guest, "host ready flag", |view| {
        view.participants.iter().any(|p| p.username == "A" && p.ready)
    })
    .await;

    // Outlast the cooldown, then withdraw.
    tokio::time::sleep(Duration::from_millis(150)).await;
    host.toggle_ready().unwrap();
    wait_for(&guest, "ready notice", |view| {
        view.ready_notice.as_deref() == Some("A is no longer ready")
    })
    .await;

    host.leave().await;
    wait_for(&guest, "promotion", |view| view.is_host).await;
    assert_eq!(guest.view().countdown, None);

    guest.leave().await;
}

//! Resolution of a room's content reference through the REST collaborator.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode, Url};
use tokio::{sync::watch, time::sleep};
use tracing::{info, warn};

use crate::{
    config::RetryPolicy,
    dto::room::RoomSummary,
    error::ContentError,
    state::room::Room,
};

/// Looks up the content reference of a room.
pub trait ContentResolver: Send + Sync {
    /// Fetch the room description of `room_id`.
    fn resolve(&self, room_id: &str) -> BoxFuture<'static, Result<Room, ContentError>>;
}

/// [`ContentResolver`] backed by `GET {base_url}/rooms/{room_id}`.
#[derive(Clone)]
pub struct RestContentResolver {
    client: Client,
    base_url: Url,
}

impl RestContentResolver {
    /// Resolver for the content API rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ContentError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ContentError::InvalidBaseUrl(base_url.to_string()))?;
        let client = Client::builder()
            .build()
            .map_err(|source| ContentError::ClientBuilder { source })?;

        Ok(Self { client, base_url })
    }
}

/// `{base}/rooms/{room_id}` with the room id percent-encoded as one segment.
fn room_url(base: &Url, room_id: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("rooms").push(room_id);
    }
    url
}

impl ContentResolver for RestContentResolver {
    fn resolve(&self, room_id: &str) -> BoxFuture<'static, Result<Room, ContentError>> {
        let client = self.client.clone();
        let url = room_url(&self.base_url, room_id);
        let room_id = room_id.to_string();

        Box::pin(async move {
            let response =
                client
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| ContentError::RequestSend {
                        room_id: room_id.clone(),
                        source,
                    })?;

            match response.status() {
                StatusCode::OK => {}
                status => return Err(ContentError::RequestStatus { room_id, status }),
            }

            let summary = response.json::<RoomSummary>().await.map_err(|source| {
                ContentError::DecodeResponse {
                    room_id: room_id.clone(),
                    source,
                }
            })?;

            room_from_summary(summary)
        })
    }
}

fn room_from_summary(summary: RoomSummary) -> Result<Room, ContentError> {
    match summary.content_uri {
        Some(uri) if !uri.trim().is_empty() => Ok(Room {
            id: summary.room_id,
            host_username: summary.host_username,
            content_uri: uri,
        }),
        _ => Err(ContentError::MissingContent {
            room_id: summary.room_id,
        }),
    }
}

/// Observable progress of content resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentState {
    Pending,
    Ready(Room),
    /// Automatic retries are exhausted; only a manual retry leaves this state.
    Failed { message: String },
}

/// Resolves a room's content with a few automatic retries, then parks in
/// [`ContentState::Failed`] until [`ContentLoader::retry`] is called.
pub struct ContentLoader {
    resolver: Arc<dyn ContentResolver>,
    room_id: String,
    policy: RetryPolicy,
    state: watch::Sender<ContentState>,
}

impl ContentLoader {
    /// Loader for `room_id`, starting in [`ContentState::Pending`].
    pub fn new(resolver: Arc<dyn ContentResolver>, room_id: impl Into<String>, policy: RetryPolicy) -> Self {
        let (state, _rx) = watch::channel(ContentState::Pending);
        Self {
            resolver,
            room_id: room_id.into(),
            policy,
            state,
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ContentState> {
        self.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> ContentState {
        self.state.borrow().clone()
    }

    /// Run one attempt plus the configured retries.
    pub async fn load(&self) -> Result<Room, ContentError> {
        self.state.send_replace(ContentState::Pending);
        let mut attempt = 0;

        loop {
            match self.resolver.resolve(&self.room_id).await {
                Ok(room) => {
                    info!(room = %room.id, content = %room.content_uri, "resolved room content");
                    self.state.send_replace(ContentState::Ready(room.clone()));
                    return Ok(room);
                }
                Err(err) if attempt < self.policy.retries => {
                    attempt += 1;
                    warn!(room = %self.room_id, attempt, error = %err, "content resolution failed; retrying");
                    sleep(self.policy.backoff).await;
                }
                Err(err) => {
                    warn!(room = %self.room_id, error = %err, "content resolution failed; giving up");
                    self.state.send_replace(ContentState::Failed {
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            }
        }
    }

    /// Manual retry; a room that is already resolved is returned as is.
    pub async fn retry(&self) -> Result<Room, ContentError> {
        if let ContentState::Ready(room) = self.state() {
            return Ok(room);
        }
        self.load().await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    /// Fails the first `failures` lookups, then succeeds.
    struct FlakyResolver {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    impl ContentResolver for FlakyResolver {
        fn resolve(&self, room_id: &str) -> BoxFuture<'static, Result<Room, ContentError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let failures = self.failures;
            let room_id = room_id.to_string();
            Box::pin(async move {
                if call < failures {
                    Err(ContentError::MissingContent { room_id })
                } else {
                    Ok(Room {
                        id: room_id,
                        host_username: Some("A".into()),
                        content_uri: "https://cdn.example.com/m.mp4".into(),
                    })
                }
            })
        }
    }

    fn loader(failures: usize) -> (ContentLoader, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = FlakyResolver {
            failures,
            calls: calls.clone(),
        };
        let policy = RetryPolicy {
            retries: 2,
            backoff: Duration::from_secs(1),
        };
        (ContentLoader::new(Arc::new(resolver), "r1", policy), calls)
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_within_automatic_retries() {
        let (loader, calls) = loader(2);
        let room = loader.load().await.unwrap();

        assert_eq!(room.content_uri, "https://cdn.example.com/m.mp4");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(loader.state(), ContentState::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn parks_in_failed_state_then_manual_retry_succeeds() {
        let (loader, calls) = loader(3);

        assert!(loader.load().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(loader.state(), ContentState::Failed { .. }));

        let room = loader.retry().await.unwrap();
        assert_eq!(room.id, "r1");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn summary_without_content_is_an_error() {
        let summary = RoomSummary {
            room_id: "r1".into(),
            host_username: None,
            content_uri: Some("  ".into()),
            participants: Vec::new(),
        };
        assert!(matches!(
            room_from_summary(summary),
            Err(ContentError::MissingContent { .. })
        ));
    }

    #[test]
    fn room_ids_are_encoded_as_a_single_path_segment() {
        let root = Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            room_url(&root, "movie night").as_str(),
            "http://localhost:8080/rooms/movie%20night"
        );

        let nested = Url::parse("http://localhost:8080/api/").unwrap();
        let url = room_url(&nested, "a?b#c/d");
        assert_eq!(url.as_str(), "http://localhost:8080/api/rooms/a%3Fb%23c%2Fd");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn rejects_unusable_base_urls() {
        for base in ["not a url", "mailto:rooms@example.com"] {
            assert!(matches!(
                RestContentResolver::new(base),
                Err(ContentError::InvalidBaseUrl(_))
            ));
        }
        assert!(RestContentResolver::new("http://localhost:8080/").is_ok());
    }
}

//! Application-level configuration loading, including the session timing knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the binaries look for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WATCHPARTY_CONFIG_PATH";

const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/ws";
const DEFAULT_CONTENT_API_URL: &str = "http://localhost:8080";

/// Timers driving a single room session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimings {
    /// First value shown by the countdown once everybody is ready.
    pub countdown_from: u8,
    /// Delay between two countdown ticks.
    pub countdown_tick: Duration,
    /// How long a "no longer ready" notice stays visible.
    pub ready_notice: Duration,
    /// How long the "synced to" indicator stays visible.
    pub sync_indicator: Duration,
    /// Window during which further ready toggles are ignored.
    pub toggle_cooldown: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            countdown_from: 3,
            countdown_tick: Duration::from_secs(1),
            ready_notice: Duration::from_secs(2),
            sync_indicator: Duration::from_secs(3),
            toggle_cooldown: Duration::from_secs(3),
        }
    }
}

/// Retry policy applied when resolving a room's content reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries after the first failed attempt.
    pub retries: u32,
    /// Fixed pause between two attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// WebSocket endpoint of the room relay.
    pub server_url: String,
    /// Base URL of the REST collaborator resolving room content.
    pub content_api_url: String,
    /// Pause before the transport tries to reconnect.
    pub reconnect_delay: Duration,
    /// Session timers.
    pub timings: SessionTimings,
    /// Content resolution retries.
    pub content_retry: RetryPolicy,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        server_url = %app_config.server_url,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    server_url: Option<String>,
    content_api_url: Option<String>,
    reconnect_delay_ms: Option<u64>,
    countdown_from: Option<u8>,
    countdown_tick_ms: Option<u64>,
    ready_notice_ms: Option<u64>,
    sync_indicator_ms: Option<u64>,
    toggle_cooldown_ms: Option<u64>,
    content_retries: Option<u32>,
    content_backoff_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let timings = SessionTimings::default();
        let retry = RetryPolicy::default();
        let millis = |raw: Option<u64>, fallback: Duration| {
            raw.map(Duration::from_millis).unwrap_or(fallback)
        };

        Self {
            server_url: value
                .server_url
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            content_api_url: value
                .content_api_url
                .unwrap_or_else(|| DEFAULT_CONTENT_API_URL.to_string()),
            reconnect_delay: millis(value.reconnect_delay_ms, Duration::from_secs(5)),
            timings: SessionTimings {
                countdown_from: value
                    .countdown_from
                    .filter(|from| *from > 0)
                    .unwrap_or(timings.countdown_from),
                countdown_tick: millis(value.countdown_tick_ms, timings.countdown_tick),
                ready_notice: millis(value.ready_notice_ms, timings.ready_notice),
                sync_indicator: millis(value.sync_indicator_ms, timings.sync_indicator),
                toggle_cooldown: millis(value.toggle_cooldown_ms, timings.toggle_cooldown),
            },
            content_retry: RetryPolicy {
                retries: value.content_retries.unwrap_or(retry.retries),
                backoff: millis(value.content_backoff_ms, retry.backoff),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

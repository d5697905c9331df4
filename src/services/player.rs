//! Local playback seam.

use tokio::time::Instant;

/// Local video playback driven by the session.
pub trait Player: Send + 'static {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;
    /// Jump to `position` seconds.
    fn seek(&mut self, position: f64);
    /// Resume playback.
    fn play(&mut self);
    /// Pause playback.
    fn pause(&mut self);
    /// Whether playback is paused.
    fn is_paused(&self) -> bool;
}

/// Headless player whose position advances with the clock while playing.
#[derive(Debug, Clone)]
pub struct ClockPlayer {
    content_uri: Option<String>,
    position: f64,
    playing_since: Option<Instant>,
}

impl ClockPlayer {
    /// A paused player at position zero.
    pub fn new(content_uri: Option<String>) -> Self {
        Self {
            content_uri,
            position: 0.0,
            playing_since: None,
        }
    }

    /// Loaded content, if any.
    pub fn content_uri(&self) -> Option<&str> {
        self.content_uri.as_deref()
    }
}

impl Player for ClockPlayer {
    fn current_time(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64(),
            None => self.position,
        }
    }

    fn seek(&mut self, position: f64) {
        self.position = position.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        self.position = self.current_time();
        self.playing_since = None;
    }

    fn is_paused(&self) -> bool {
        self.playing_since.is_none()
    }
}

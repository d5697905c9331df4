use indexmap::IndexMap;

/// A viewer inside a room and its readiness flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Unique name of the participant within the room.
    pub username: String,
    /// Whether the participant is ready to start.
    pub ready: bool,
}

impl Participant {
    /// Build a participant entry.
    pub fn new(username: impl Into<String>, ready: bool) -> Self {
        Self {
            username: username.into(),
            ready,
        }
    }
}

/// Authoritative room state as broadcast by the relay.
///
/// A snapshot always replaces the previous one wholesale; it is never merged
/// with local predictions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessSnapshot {
    /// Participants in broadcast order.
    pub participants: Vec<Participant>,
    /// Identity of the room's current host.
    pub host_username: String,
}

impl ReadinessSnapshot {
    /// True when the room is non-empty and every participant is ready.
    pub fn all_ready(&self) -> bool {
        !self.participants.is_empty() && self.participants.iter().all(|p| p.ready)
    }

    /// Readiness flag of `username`, if present in the snapshot.
    pub fn ready_flag(&self, username: &str) -> Option<bool> {
        self.participants
            .iter()
            .find(|p| p.username == username)
            .map(|p| p.ready)
    }
}

/// Result of applying a snapshot to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessUpdate {
    /// Last other participant that flipped from ready to not ready.
    pub dropped: Option<String>,
    /// Whether the new snapshot is an "all ready" barrier.
    pub all_ready: bool,
    /// Flag reported for the local participant.
    pub local_ready: Option<bool>,
}

/// Keeps the latest snapshot and detects ready → not-ready transitions.
#[derive(Debug, Clone, Default)]
pub struct ReadinessTracker {
    current: Option<ReadinessSnapshot>,
    previous_flags: IndexMap<String, bool>,
}

impl ReadinessTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot received, if any.
    pub fn current(&self) -> Option<&ReadinessSnapshot> {
        self.current.as_ref()
    }

    /// Host reported by the latest snapshot.
    pub fn host(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.host_username.as_str())
    }

    /// Replace the current snapshot and diff it against the previous one.
    pub fn apply(&mut self, snapshot: ReadinessSnapshot, local_user: &str) -> ReadinessUpdate {
        let flags: IndexMap<String, bool> = snapshot
            .participants
            .iter()
            .map(|p| (p.username.clone(), p.ready))
            .collect();

        // Only the last flip in iteration order is surfaced.
        let dropped = flags
            .iter()
            .filter(|(username, ready)| {
                username.as_str() != local_user
                    && !**ready
                    && self.previous_flags.get(username.as_str()) == Some(&true)
            })
            .map(|(username, _)| username.clone())
            .last();

        let update = ReadinessUpdate {
            dropped,
            all_ready: snapshot.all_ready(),
            local_ready: flags.get(local_user).copied(),
        };

        self.previous_flags = flags;
        self.current = Some(snapshot);
        update
    }
}

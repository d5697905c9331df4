//! Cancellable one-shot timers, one slot per [`TimerKind`].

use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::debug;

use crate::state::transitions::TimerKind;

/// A timer expiry delivered back to the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Timer that elapsed.
    pub kind: TimerKind,
    /// Schedule it belongs to; stale generations are ignored.
    pub generation: u64,
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owns every pending timer of a session.
///
/// Scheduling a kind cancels whatever was pending for it, and a firing that
/// raced a cancellation is rejected by [`Timers::accept`]. Dropping the set
/// aborts all pending timers.
pub struct Timers {
    tx: mpsc::UnboundedSender<TimerFired>,
    pending: HashMap<TimerKind, Pending>,
    next_generation: u64,
}

impl Timers {
    /// Create a timer set delivering expiries on `tx`.
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            pending: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Schedule `kind` to fire after `after`, replacing any pending one.
    pub fn schedule(&mut self, kind: TimerKind, after: Duration) {
        self.cancel(kind);
        self.next_generation += 1;
        let generation = self.next_generation;
        let deadline = Instant::now() + after;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            let _ = tx.send(TimerFired { kind, generation });
        });
        self.pending.insert(kind, Pending { generation, handle });
    }

    /// Cancel the pending timer of `kind`, if any.
    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(pending) = self.pending.remove(&kind) {
            pending.handle.abort();
        }
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Whether a timer of `kind` is pending.
    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// Claim a firing; stale or cancelled generations are rejected.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        match self.pending.get(&fired.kind) {
            Some(pending) if pending.generation == fired.generation => {
                self.pending.remove(&fired.kind);
                true
            }
            _ => {
                debug!(kind = ?fired.kind, generation = fired.generation, "ignoring stale timer");
                false
            }
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

use thiserror::Error;

/// Phases of the local start countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPhase {
    /// Waiting for an "all ready" barrier.
    Idle,
    /// The barrier was reached; counting starts right away.
    Armed,
    /// Counting down; the value is the number currently displayed.
    Counting(u8),
    /// The countdown reached zero ("Go").
    Fired,
}

/// Events that can be applied to the countdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Every participant became ready.
    Arm,
    /// Start counting from the given value.
    Begin(u8),
    /// One tick of wall-clock time elapsed.
    Tick,
    /// Counting reached zero.
    Fire,
    /// The fired countdown settles back to idle.
    Settle,
    /// Someone is no longer ready; abandon the countdown.
    Disarm,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the coordinator was in when the event was received.
    pub from: CountdownPhase,
    /// The event that cannot be applied from this phase.
    pub event: CountdownEvent,
}

/// Observable outcome of feeding the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStep {
    /// Nothing changed.
    Unchanged,
    /// A countdown started and shows the given value.
    Started(u8),
    /// A tick moved the display to the given value.
    Counted(u8),
    /// The countdown reached zero and settled back to idle.
    Fired,
    /// An active countdown was abandoned.
    Aborted,
}

/// Barrier that turns an "all ready" snapshot into a timed countdown.
#[derive(Debug, Clone)]
pub struct CountdownCoordinator {
    phase: CountdownPhase,
    from: u8,
    /// Set once per "all ready" streak so duplicate snapshots never re-arm.
    started: bool,
}

impl CountdownCoordinator {
    /// Create an idle coordinator that counts down from `from`.
    pub fn new(from: u8) -> Self {
        Self {
            phase: CountdownPhase::Idle,
            from: from.max(1),
            started: false,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    /// Whether a countdown is armed or running.
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            CountdownPhase::Armed | CountdownPhase::Counting(_)
        )
    }

    /// Feed the barrier state derived from the latest snapshot.
    pub fn observe(&mut self, all_ready: bool) -> CountdownStep {
        if !all_ready {
            self.started = false;
            if self.is_active() {
                self.force(CountdownEvent::Disarm);
                return CountdownStep::Aborted;
            }
            return CountdownStep::Unchanged;
        }

        if self.started || self.phase != CountdownPhase::Idle {
            return CountdownStep::Unchanged;
        }

        self.started = true;
        self.force(CountdownEvent::Arm);
        self.force(CountdownEvent::Begin(self.from));
        CountdownStep::Started(self.from)
    }

    /// Advance by one tick; stale ticks outside of counting are ignored.
    pub fn tick(&mut self) -> CountdownStep {
        let CountdownPhase::Counting(_) = self.phase else {
            return CountdownStep::Unchanged;
        };

        match self.apply(CountdownEvent::Tick) {
            Ok(CountdownPhase::Counting(0)) => {
                self.force(CountdownEvent::Fire);
                self.force(CountdownEvent::Settle);
                CountdownStep::Fired
            }
            Ok(CountdownPhase::Counting(n)) => CountdownStep::Counted(n),
            Ok(_) | Err(_) => CountdownStep::Unchanged,
        }
    }

    /// Drop back to idle and allow the next "all ready" barrier to arm again.
    pub fn reset(&mut self) -> CountdownStep {
        self.started = false;
        if self.is_active() {
            self.force(CountdownEvent::Disarm);
            CountdownStep::Aborted
        } else {
            CountdownStep::Unchanged
        }
    }

    /// Apply an event, moving the coordinator to the next phase.
    pub fn apply(&mut self, event: CountdownEvent) -> Result<CountdownPhase, InvalidTransition> {
        self.phase = self.compute_transition(event)?;
        Ok(self.phase)
    }

    /// Apply an event the caller already checked to be valid.
    fn force(&mut self, event: CountdownEvent) {
        if let Ok(next) = self.compute_transition(event) {
            self.phase = next;
        }
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: CountdownEvent) -> Result<CountdownPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (CountdownPhase::Idle, CountdownEvent::Arm) => CountdownPhase::Armed,
            (CountdownPhase::Armed, CountdownEvent::Begin(n)) if n > 0 => {
                CountdownPhase::Counting(n)
            }
            (CountdownPhase::Counting(n), CountdownEvent::Tick) if n > 0 => {
                CountdownPhase::Counting(n - 1)
            }
            (CountdownPhase::Counting(0), CountdownEvent::Fire) => CountdownPhase::Fired,
            (CountdownPhase::Fired, CountdownEvent::Settle) => CountdownPhase::Idle,
            (CountdownPhase::Armed | CountdownPhase::Counting(_), CountdownEvent::Disarm) => {
                CountdownPhase::Idle
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_idle() {
        let coordinator = CountdownCoordinator::new(3);
        assert_eq!(coordinator.phase(), CountdownPhase::Idle);
        assert!(!coordinator.is_active());
    }

    #[test]
    fn all_ready_fires_after_three_ticks() {
        let mut coordinator = CountdownCoordinator::new(3);

        assert_eq!(coordinator.observe(true), CountdownStep::Started(3));
        assert_eq!(coordinator.phase(), CountdownPhase::Counting(3));
        assert_eq!(coordinator.tick(), CountdownStep::Counted(2));
        assert_eq!(coordinator.tick(), CountdownStep::Counted(1));
        assert_eq!(coordinator.tick(), CountdownStep::Fired);
        assert_eq!(coordinator.phase(), CountdownPhase::Idle);
    }

    #[test]
    fn duplicate_all_ready_snapshots_do_not_rearm() {
        let mut coordinator = CountdownCoordinator::new(3);
        coordinator.observe(true);
        assert_eq!(coordinator.observe(true), CountdownStep::Unchanged);

        coordinator.tick();
        coordinator.tick();
        coordinator.tick();
        assert_eq!(coordinator.observe(true), CountdownStep::Unchanged);
        assert_eq!(coordinator.phase(), CountdownPhase::Idle);
    }

    #[test]
    fn rearms_after_not_ready_cycle() {
        let mut coordinator = CountdownCoordinator::new(3);
        coordinator.observe(true);
        for _ in 0..3 {
            coordinator.tick();
        }

        assert_eq!(coordinator.observe(false), CountdownStep::Unchanged);
        assert_eq!(coordinator.observe(true), CountdownStep::Started(3));
    }

    #[test]
    fn not_ready_while_counting_aborts() {
        let mut coordinator = CountdownCoordinator::new(3);
        coordinator.observe(true);
        coordinator.tick();

        assert_eq!(coordinator.observe(false), CountdownStep::Aborted);
        assert_eq!(coordinator.phase(), CountdownPhase::Idle);
        assert_eq!(coordinator.tick(), CountdownStep::Unchanged);
    }

    #[test]
    fn reset_clears_started_flag() {
        let mut coordinator = CountdownCoordinator::new(3);
        coordinator.observe(true);

        assert_eq!(coordinator.reset(), CountdownStep::Aborted);
        assert_eq!(coordinator.observe(true), CountdownStep::Started(3));
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut coordinator = CountdownCoordinator::new(3);
        let err = coordinator.apply(CountdownEvent::Tick).unwrap_err();

        assert_eq!(err.from, CountdownPhase::Idle);
        assert_eq!(err.event, CountdownEvent::Tick);
    }
}

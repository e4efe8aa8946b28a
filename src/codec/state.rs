// Transfer state machine shared by the decode and encode loops

use std::fmt;

/// Lifecycle of one engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Configuring,
    Started,
    Transferring,
    Finished,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configuring => "configuring",
            Phase::Started => "started",
            Phase::Transferring => "transferring",
            Phase::Finished => "finished",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl Phase {
    /// Whether `self -> next` is a legal step.
    ///
    /// Every phase may jump to `Closed`; otherwise phases only move forward
    /// one step at a time.
    pub fn can_advance_to(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Configuring, Phase::Started)
                | (Phase::Started, Phase::Transferring)
                | (Phase::Transferring, Phase::Finished)
                | (Phase::Configuring | Phase::Started | Phase::Transferring | Phase::Finished, Phase::Closed)
        )
    }
}

/// Tracks the phase of one call and logs every transition.
///
/// Dropping a tracker that never reached `Closed` logs the early close
/// taken on the error path.
pub struct PhaseTracker {
    direction: &'static str,
    phase: Phase,
}

impl PhaseTracker {
    pub fn new(direction: &'static str) -> Self {
        PhaseTracker {
            direction,
            phase: Phase::Configuring,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to `next`. An illegal transition is a bug in the caller.
    pub fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "{}: illegal transition {} -> {}",
            self.direction,
            self.phase,
            next
        );
        tracing::trace!(direction = self.direction, from = %self.phase, to = %next, "phase");
        self.phase = next;
    }

    /// Close after a successful finish.
    pub fn close(&mut self) {
        self.advance(Phase::Closed);
    }
}

impl Drop for PhaseTracker {
    fn drop(&mut self) {
        if self.phase != Phase::Closed {
            tracing::debug!(
                direction = self.direction,
                from = %self.phase,
                "session closed early"
            );
        }
    }
}

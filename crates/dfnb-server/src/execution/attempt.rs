//! Per-attempt state machine.
//!
//! `Idle -> Submitting -> Streaming -> Completed | Failed | Aborted`, with
//! `Submitting -> Failed` for submissions that never reach the backend.

use std::fmt;

use serde::Serialize;

use dfnb_core::ShortCellId;
use dfnb_state::SessionId;

/// Identity of one execution attempt, unique per coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No compute connection. Recovered locally.
    NoBackend,
    /// The reply reported an execution error.
    Backend,
    Transport,
    Disconnected,
    /// The reply carried an unusable identifier.
    InvalidReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "kind")]
pub enum AttemptState {
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed(FailureKind),
    Aborted,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptState::Completed | AttemptState::Failed(_) | AttemptState::Aborted
        )
    }

    pub fn can_advance_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Streaming)
                | (Submitting, Failed(_))
                | (Streaming, Completed)
                | (Streaming, Failed(_))
                | (Streaming, Aborted)
        )
    }
}

/// One execution attempt for one cell.
#[derive(Debug)]
pub struct Attempt {
    id: AttemptId,
    session: SessionId,
    cell: ShortCellId,
    state: AttemptState,
}

impl Attempt {
    pub fn new(id: AttemptId, session: SessionId, cell: ShortCellId) -> Self {
        Attempt {
            id,
            session,
            cell,
            state: AttemptState::Idle,
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn cell(&self) -> ShortCellId {
        self.cell
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Moves to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: AttemptState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(
                session = %self.session,
                cell = %self.cell,
                attempt = %self.id,
                from = ?self.state,
                to = ?next,
                "ignoring illegal attempt transition"
            );
            return;
        }
        tracing::debug!(
            session = %self.session,
            cell = %self.cell,
            attempt = %self.id,
            from = ?self.state,
            to = ?next,
            "attempt transition"
        );
        self.state = next;
    }
}

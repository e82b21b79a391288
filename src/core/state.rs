//! Run state values

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a flow or task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    /// Run has not started
    Pending,
    /// Run is scheduled for a future occurrence
    Scheduled,
    /// Run is currently executing
    Running,
    /// Run finished successfully
    Success,
    /// Run finished with an error
    Failed,
    /// Run's trigger condition was not satisfied
    TriggerFailed,
    /// Run was skipped
    Skipped,
}

/// State of a single run: a status plus optional result data and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub status: StateKind,
    pub data: Option<Value>,
    pub message: Option<String>,
}

impl State {
    pub fn new(status: StateKind) -> Self {
        Self {
            status,
            data: None,
            message: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, StateKind::Pending | StateKind::Scheduled)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, StateKind::Running)
    }

    /// Check if the run is in a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            StateKind::Success | StateKind::Failed | StateKind::TriggerFailed | StateKind::Skipped
        )
    }

    /// A skipped run satisfies downstream triggers, so it counts as successful
    pub fn is_successful(&self) -> bool {
        matches!(self.status, StateKind::Success | StateKind::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, StateKind::Failed | StateKind::TriggerFailed)
    }
}

/// Outcome of a dispatched stage: either a replacement State, or the
/// distinguished "leave the state alone" result.
///
/// Stages signal "no change" explicitly rather than by returning a nullable
/// State, so the sentinel can never be confused with a real resolved State
/// or with an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateUpdate {
    Changed(State),
    Unchanged,
}

impl StateUpdate {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, StateUpdate::Unchanged)
    }

    /// Resolve the update against a fallback State, returning the fallback
    /// when nothing changed.
    pub fn into_state(self, fallback: State) -> State {
        match self {
            StateUpdate::Changed(state) => state,
            StateUpdate::Unchanged => fallback,
        }
    }
}

//! Agent lifecycle state (spec.md §3/§4.1).

use serde::{Deserialize, Serialize};

/// One of the agent lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Constructed but not yet initialized.
    Init,
    /// Initialized and idle; `execute` may be called.
    Ready,
    /// An `execute` call is in progress.
    Running,
    /// Execution suspended (human-in-the-loop, step debugging, ...).
    Paused,
    /// The task completed successfully.
    Completed,
    /// The task failed.
    Failed,
}

impl State {
    /// Whether `to` is reachable from `self` per the transition table in
    /// spec.md §4.1:
    ///
    /// `Init -> Ready`; `Ready -> {Running, Completed, Failed}`;
    /// `Running -> {Ready, Paused, Completed, Failed}`;
    /// `Paused -> {Running, Failed}`.
    #[must_use]
    pub fn can_transition_to(self, to: State) -> bool {
        use State::*;
        matches!(
            (self, to),
            (Init, Ready)
                | (Ready, Running)
                | (Ready, Completed)
                | (Ready, Failed)
                | (Running, Ready)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Failed)
        )
    }
}

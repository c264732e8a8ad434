//! ReAct executor configuration (spec.md §4.5).

/// What to do when a dispatched tool call returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorPolicy {
    /// Stop the loop and surface the error.
    StopOnError,
    /// Feed the error back to the model as a tool result and keep iterating.
    ContinueOnError,
}

/// `maxReActIterations` default per spec.md §6; also what `0` normalizes to.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Tunables for one [`crate::ReActExecutor::run`] call.
#[derive(Debug, Clone)]
pub struct ReActConfig {
    /// Cap on model-call iterations before giving up; `0` is interpreted as
    /// [`DEFAULT_MAX_ITERATIONS`] (spec.md §4.5).
    pub max_iterations: usize,
    /// What happens when a tool call fails.
    pub tool_error_policy: ToolErrorPolicy,
    /// Whether tool calls within one iteration run concurrently.
    pub parallel_tool_calls: bool,
}

impl ReActConfig {
    /// The effective iteration cap: `max_iterations`, or
    /// [`DEFAULT_MAX_ITERATIONS`] if it's `0`.
    #[must_use]
    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }
}

impl Default for ReActConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            // spec.md §4.5: "false (default) — continue the loop".
            tool_error_policy: ToolErrorPolicy::ContinueOnError,
            parallel_tool_calls: true,
        }
    }
}

//! Guardrails retry policy for the execution orchestrator (spec.md §6
//! `guardrails{onInputFailure, onOutputFailure, maxRetries}`).

/// What to do when a (non-tripwire) guardrail validator rejects content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Reject the call outright with a [`neuron_types::AgentError::Guardrails`] error.
    Reject,
    /// Log the failure and continue with the (possibly filtered) content.
    Warn,
    /// Resubmit with a synthesized correction prompt, up to `max_retries` times.
    /// Only meaningful for output validation; treated as `Reject` on input.
    Retry,
}

/// Tunables for [`crate::Agent::execute`]'s guardrails retry loop. A tripwire
/// always rejects outright regardless of these policies.
#[derive(Debug, Clone)]
pub struct GuardrailsConfig {
    /// Policy applied when the input validator chain rejects (non-tripwire).
    pub on_input_failure: FailurePolicy,
    /// Policy applied when the output validator chain rejects (non-tripwire).
    pub on_output_failure: FailurePolicy,
    /// Maximum number of regenerate-and-revalidate attempts after the first.
    pub max_retries: usize,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            on_input_failure: FailurePolicy::Reject,
            on_output_failure: FailurePolicy::Reject,
            max_retries: 1,
        }
    }
}

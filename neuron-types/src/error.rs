//! Top-level error taxonomy (spec.md §7).

use thiserror::Error;

use crate::state::State;
use crate::validation::ValidationResult;

/// A model provider failed to produce a completion.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the request outright (bad model, bad auth, ...).
    #[error("provider rejected request: {0}")]
    Rejected(String),
    /// The underlying transport failed (network, timeout, ...).
    #[error("provider transport error: {0}")]
    Transport(String),
    /// The provider's response could not be parsed into a [`crate::completion::ChatResponse`].
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    /// A streaming call closed its channel before sending a terminal chunk.
    #[error("stream from provider {0} ended without a final response")]
    MalformedStream(String),
}

/// A tool dispatch failed.
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool registered under that name.
    #[error("unknown tool: {0}")]
    NotFound(String),
    /// The tool is not on the caller's allowed list.
    #[error("tool {0} not allowed")]
    NotPermitted(String),
    /// The tool's input failed to parse/validate.
    #[error("invalid tool input for {tool}: {message}")]
    InvalidInput {
        /// Tool name.
        tool: String,
        /// Why the input was rejected.
        message: String,
    },
    /// The tool ran but returned an error.
    #[error("tool {tool} failed: {message}")]
    ExecutionFailed {
        /// Tool name.
        tool: String,
        /// The tool's own error message.
        message: String,
    },
}

/// The ReAct loop could not complete.
#[derive(Debug, Error)]
pub enum LoopError {
    /// A tool call failed and the configured policy was to stop.
    #[error("tool call failed and stop-on-error policy is active: {0}")]
    StoppedOnToolError(#[source] ToolError),
    /// Tools were requested on a provider that doesn't advertise native
    /// function-calling support; checked before the first model call.
    #[error("provider {0} does not support function calling")]
    ProviderUnsupported(String),
    /// The underlying provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Which side of `Agent::execute` a [`AgentError::Guardrails`] failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailKind {
    /// The input validator chain rejected the request.
    Input,
    /// The output validator chain rejected the response (retries exhausted).
    Output,
}

/// An approval workflow failed.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// No request exists with that id.
    #[error("unknown approval request: {0}")]
    NotFound(String),
    /// The request already has a final disposition.
    #[error("approval {0} already resolved")]
    AlreadyResolved(String),
}

/// The single error type returned by [`crate::traits`] collaborators and by
/// `Agent::execute` (spec.md §7).
#[derive(Debug, Error)]
pub enum AgentError {
    /// `execute` was called before the agent reached [`State::Ready`].
    #[error("agent is not ready (state is {0:?})")]
    NotReady(State),
    /// `execute` was called while another call already holds the execution lock.
    #[error("agent is busy executing another request")]
    Busy,
    /// An invalid lifecycle transition was attempted.
    #[error("cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// State transitioned from.
        from: State,
        /// State attempted to transition to.
        to: State,
    },
    /// A guardrail tripwire fired; the request is rejected outright regardless
    /// of the configured `onInputFailure`/`onOutputFailure` policy.
    #[error("tripwire fired in validator {validator_name}: {result:?}")]
    Tripwire {
        /// Name of the validator that set `tripwire=true`.
        validator_name: String,
        /// The (possibly merged) result that carried the tripwire.
        result: ValidationResult,
    },
    /// One or more non-tripwire guardrail validators failed and the
    /// configured policy was `reject` (or `retry` with no attempts left).
    #[error("{kind:?} guardrails rejected content: {errors:?}")]
    Guardrails {
        /// Whether this came from the input or output validator chain.
        kind: GuardrailKind,
        /// The rejecting errors.
        errors: Vec<String>,
    },
    /// No checkpoint exists for the requested thread/version.
    #[error("checkpoint not found: thread={thread_id} version={version:?}")]
    CheckpointNotFound {
        /// Thread id looked up.
        thread_id: String,
        /// Version looked up, or `None` for "latest".
        version: Option<u64>,
    },
    /// The model provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// A tool call failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
    /// The ReAct loop failed.
    #[error(transparent)]
    Loop(#[from] LoopError),
    /// An approval workflow failed.
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    /// The call was cancelled cooperatively.
    #[error("execution cancelled")]
    Cancelled,
    /// A configured deadline elapsed before completion.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// A memory or checkpoint store failed for a reason of its own.
    #[error("storage error: {0}")]
    Storage(String),
    /// Every subagent spawned by `executeWithSubagents` failed.
    #[error("all {0} subagents failed: {1:?}")]
    AllSubagentsFailed(usize, Vec<(String, String)>),
}

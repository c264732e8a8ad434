//! The `Execute` entry point's public request/response types (spec.md §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::duration::DurationMs;

/// A value in `Input.context`/`Output.metadata` free-form maps.
pub type ValueMap = HashMap<String, serde_json::Value>;

/// The input to one `Agent::execute` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Input {
    /// Opaque correlation id, required, echoed verbatim on `Output`.
    pub trace_id: String,
    /// Optional tenant identifier.
    pub tenant_id: Option<String>,
    /// Optional user identifier.
    pub user_id: Option<String>,
    /// Optional channel identifier.
    pub channel_id: Option<String>,
    /// The prompt text.
    pub content: String,
    /// Free-form context passed through to the system-prompt template.
    pub context: ValueMap,
    /// Variables substituted into the system-prompt template.
    pub variables: HashMap<String, String>,
}

impl Input {
    /// Construct a minimal input with only a trace id and content.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// The output of one `Agent::execute` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Output {
    /// Echoed from `Input.trace_id`.
    pub trace_id: String,
    /// The final answer text.
    pub content: String,
    /// Total tokens consumed across the run.
    pub tokens_used: usize,
    /// Estimated cost in USD, if the provider reported pricing.
    pub cost: Option<f64>,
    /// Wall-clock duration of the `execute` call.
    pub duration: DurationMs,
    /// Why the model stopped generating on the final iteration.
    pub finish_reason: String,
    /// Model/provider/retry-count and other bookkeeping metadata.
    pub metadata: ValueMap,
}

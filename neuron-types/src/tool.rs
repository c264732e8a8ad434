//! Tool call/result types and the runtime context passed to tool execution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::duration::DurationMs;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier unique within one model response.
    pub id: String,
    /// Name of the tool to invoke; unique per tool registry.
    pub name: String,
    /// Opaque argument bytes, assumed JSON.
    pub arguments: Vec<u8>,
}

impl ToolCall {
    /// Parse `arguments` as JSON, defaulting to `null` on malformed input.
    #[must_use]
    pub fn arguments_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.arguments).unwrap_or(serde_json::Value::Null)
    }
}

/// The result of executing one [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// References the originating [`ToolCall::id`].
    pub tool_call_id: String,
    /// The tool's name, echoed for convenience.
    pub name: String,
    /// Result bytes on success.
    pub result: Vec<u8>,
    /// Non-empty when the call failed; empty string on success.
    pub error: String,
    /// How long the tool took to execute.
    pub duration: DurationMs,
}

impl ToolResult {
    /// Build a successful result from UTF-8 text.
    #[must_use]
    pub fn ok(tool_call_id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result: text.into().into_bytes(),
            error: String::new(),
            duration: DurationMs::ZERO,
        }
    }

    /// Build an error result with the given message.
    #[must_use]
    pub fn err(tool_call_id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            result: Vec::new(),
            error: message.into(),
            duration: DurationMs::ZERO,
        }
    }

    /// Whether this result represents a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// The result (or error) rendered as text, for appending to the transcript.
    #[must_use]
    pub fn as_text(&self) -> String {
        if self.is_error() {
            self.error.clone()
        } else {
            String::from_utf8_lossy(&self.result).into_owned()
        }
    }
}

/// Runtime context threaded through one tool dispatch.
#[derive(Clone)]
pub struct ToolContext {
    /// Agent issuing this call, for registry-side authorization/quoting.
    pub agent_id: String,
    /// Arbitrary environment values visible to tools.
    pub environment: HashMap<String, String>,
    /// Cooperative cancellation token.
    pub cancellation_token: CancellationToken,
}

impl ToolContext {
    /// Build a context for the given agent with no environment overlay.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            environment: HashMap::new(),
            cancellation_token: CancellationToken::new(),
        }
    }
}

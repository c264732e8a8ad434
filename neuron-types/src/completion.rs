//! Chat-completion request/response types exchanged with a [`crate::traits::ModelProvider`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::message::Message;

/// Definition of a tool available to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name (unique identifier within the registry).
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub parameters: serde_json::Value,
}

/// A request to an LLM provider, per spec.md §4.5/§6 ("ChatRequest").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model identifier.
    pub model: String,
    /// The conversation messages (the ReAct working set).
    pub messages: Vec<Message>,
    /// Tool schemas available to the model this call.
    pub tools: Vec<ToolSchema>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Sequences that cause generation to stop.
    pub stop: Vec<String>,
    /// Per-call timeout.
    #[serde(skip, default)]
    pub timeout: Option<Duration>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Model reached a natural end.
    Stop,
    /// Model wants to use a tool.
    ToolCalls,
    /// Hit the max token limit.
    MaxTokens,
    /// Hit a stop sequence.
    StopSequence,
    /// Content was filtered.
    ContentFilter,
}

/// Token usage statistics for a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the input/prompt.
    pub input_tokens: usize,
    /// Tokens in the output/completion.
    pub output_tokens: usize,
}

impl TokenUsage {
    /// Total tokens used (input + output), the value spec.md's
    /// `Output.tokens-used` field reports.
    #[must_use]
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// A response from an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider-assigned message ID.
    pub id: String,
    /// The provider that generated this response (for Output.metadata).
    pub provider: String,
    /// The model that generated this response.
    pub model: String,
    /// The response message.
    pub message: Message,
    /// Token usage statistics for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating.
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    /// Whether this response carries one or more tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls().is_empty()
    }
}

/// An incremental chunk emitted while streaming a completion (§6 `Chunk`).
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    /// Provider-assigned message ID, if known at this point in the stream.
    pub id: Option<String>,
    /// The provider name, if known at this point in the stream.
    pub provider: Option<String>,
    /// The model name, if known at this point in the stream.
    pub model: Option<String>,
    /// Incremental text content, if any.
    pub delta_content: Option<String>,
    /// Incremental tool-call fragments, if any.
    pub delta_tool_calls: Vec<(String, String, serde_json::Value)>,
    /// Token usage, if known at this point in the stream.
    pub usage: Option<TokenUsage>,
    /// Finish reason, if this is the terminal chunk.
    pub finish_reason: Option<FinishReason>,
    /// A transport-level error carried on this chunk, if any.
    pub error: Option<String>,
}

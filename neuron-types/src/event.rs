//! The event bus's wire type (spec.md §2 C3, §4.3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::State;

/// One published event. `topic` is the subscription key; `payload` carries
/// the event-specific data as a [`serde_json::Value`] so the bus itself
/// never needs to know about individual event shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dot-separated topic, e.g. `"state.changed"`, `"tool.call.start"`.
    pub topic: String,
    /// Agent that published this event.
    pub agent_id: String,
    /// Event-specific payload.
    pub payload: EventPayload,
    /// Publish timestamp.
    pub published_at: DateTime<Utc>,
}

impl Event {
    /// Build an event for `topic`, stamping `published_at` as now.
    #[must_use]
    pub fn new(topic: impl Into<String>, agent_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            topic: topic.into(),
            agent_id: agent_id.into(),
            payload,
            published_at: Utc::now(),
        }
    }
}

/// The well-known event payloads published by the core (spec.md §2 C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// The agent's lifecycle state changed.
    StateChanged {
        /// State before the transition.
        from: State,
        /// State after the transition.
        to: State,
    },
    /// A tool call was admitted and is about to run.
    ToolCallStart {
        /// Originating [`crate::tool::ToolCall::id`].
        tool_call_id: String,
        /// Tool name.
        name: String,
    },
    /// A tool call finished, successfully or not.
    ToolCallEnd {
        /// Originating [`crate::tool::ToolCall::id`].
        tool_call_id: String,
        /// Tool name.
        name: String,
        /// Whether the call failed.
        is_error: bool,
    },
    /// Feedback was recorded against a past interaction.
    Feedback {
        /// Free-form feedback kind, e.g. `"thumbs_up"`.
        feedback_type: String,
        /// Arbitrary structured detail.
        detail: HashMap<String, serde_json::Value>,
    },
    /// A human approval was requested.
    ApprovalRequested {
        /// The approval request id.
        approval_id: String,
        /// What is being approved.
        action: String,
    },
    /// A human approval request was resolved.
    ApprovalResponded {
        /// The approval request id.
        approval_id: String,
        /// Whether it was approved.
        approved: bool,
    },
    /// A subagent run completed.
    SubagentCompleted {
        /// The subagent's task id.
        task_id: String,
        /// Whether it succeeded.
        success: bool,
    },
}

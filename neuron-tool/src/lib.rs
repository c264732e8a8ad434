//! Tool mediator (spec.md §2 C4, §4.4).
//!
//! `dispatch` always emits exactly one `tool.call.start` and one
//! `tool.call.end` event for a call, regardless of which path it takes
//! (unknown tool, not on the allow-list, handler error, or success) — callers
//! tracing tool activity never have to special-case rejected calls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use neuron_types::event::{Event, EventPayload};
use neuron_types::{DurationMs, EventBus, ToolCall, ToolContext, ToolError, ToolHandler, ToolResult};

/// A name-keyed collection of [`ToolHandler`]s.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own [`ToolHandler::name`].
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_owned(), handler);
    }

    /// Look up a handler by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Names of every registered tool.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

/// Dispatches [`ToolCall`]s against a [`ToolRegistry`], enforcing an
/// optional allow-list and publishing start/end events for every call.
pub struct ToolMediator {
    registry: ToolRegistry,
    allowed: Option<HashSet<String>>,
    events: Option<Arc<dyn EventBus>>,
}

impl ToolMediator {
    /// Build a mediator over `registry` with no allow-list restriction.
    #[must_use]
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            allowed: None,
            events: None,
        }
    }

    /// Restrict dispatch to `allowed` tool names.
    #[must_use]
    pub fn with_allowed(mut self, allowed: impl IntoIterator<Item = String>) -> Self {
        self.allowed = Some(allowed.into_iter().collect());
        self
    }

    /// Publish start/end events through `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the 5-step dispatch algorithm: lookup, allow-list check, start
    /// event, invoke, end event.
    pub async fn dispatch(&self, call: ToolCall, ctx: &ToolContext) -> ToolResult {
        self.publish(EventPayload::ToolCallStart {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
        })
        .await;

        let started = Instant::now();
        let result = self.run(&call, ctx).await;
        let duration = DurationMs::from(started.elapsed());

        let (result, is_error) = match result {
            Ok(bytes) => (ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                result: bytes,
                error: String::new(),
                duration,
            }, false),
            Err(err) => (ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                result: Vec::new(),
                error: err.to_string(),
                duration,
            }, true),
        };

        self.publish(EventPayload::ToolCallEnd {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            is_error,
        })
        .await;

        result
    }

    async fn run(&self, call: &ToolCall, ctx: &ToolContext) -> Result<Vec<u8>, ToolError> {
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(&call.name) {
                return Err(ToolError::NotPermitted(call.name.clone()));
            }
        }
        let handler = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        handler
            .invoke(call.arguments_json(), &ctx.environment)
            .await
            .map_err(|message| ToolError::ExecutionFailed {
                tool: call.name.clone(),
                message,
            })
    }

    async fn publish(&self, payload: EventPayload) {
        if let Some(events) = &self.events {
            events.publish(Event::new("tool.call", "mediator", payload)).await;
        }
    }
}

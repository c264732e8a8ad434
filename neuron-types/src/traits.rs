//! External collaborator contracts (spec.md §1, §6).
//!
//! These are deliberately `async_trait` rather than native `async fn`/RPITIT:
//! `Agent` holds each of them as an `Arc<dyn Trait>` collaborator, which
//! requires object safety. Everything internal to one component (hooks,
//! validators) is free to use RPITIT instead; see `neuron-guardrails` and
//! `neuron-loop`.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::approval::{ApprovalRequest, ApprovalResponse};
use crate::checkpoint::Checkpoint;
use crate::completion::{ChatChunk, ChatRequest, ChatResponse};
use crate::error::{AgentError, ApprovalError, ProviderError};
use crate::event::Event;
use crate::id::SubscriptionId;
use crate::memory::{MemoryKind, MemoryRecord};

/// A chat completion backend (spec.md §4.5, §6).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Run one non-streaming completion.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Run one completion, yielding [`ChatChunk`]s over a bounded channel as
    /// they arrive (spec.md §4.5, §6 `stream(request) -> chunkChannel`). The
    /// channel is closed once a chunk carrying `finish_reason` has been sent;
    /// a caller that drains it without ever seeing one has witnessed a
    /// malformed stream.
    ///
    /// The default synthesizes a single terminal chunk from [`Self::complete`]
    /// so providers without native token-level streaming still satisfy the
    /// contract; providers that stream natively override this.
    async fn stream(&self, request: ChatRequest) -> Result<tokio::sync::mpsc::Receiver<ChatChunk>, ProviderError> {
        let response = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let _ = tx
            .send(ChatChunk {
                id: Some(response.id),
                provider: Some(response.provider),
                model: Some(response.model),
                delta_content: Some(response.message.text()),
                delta_tool_calls: response.message.tool_calls(),
                usage: Some(response.usage),
                finish_reason: Some(response.finish_reason),
                error: None,
            })
            .await;
        Ok(rx)
    }

    /// Whether this provider supports function/tool calling. The ReAct
    /// executor fails fast before its first call when this is `false` but
    /// the request carries tool schemas (spec.md §4.5).
    fn supports_tools(&self) -> bool {
        true
    }

    /// Stable provider name, used in `Output.metadata` and in the
    /// `ProviderUnsupported` error when tools are requested of a provider
    /// that can't use them.
    fn name(&self) -> &str;
}

/// Durable memory storage behind the Memory Coordinator (spec.md §2 C2).
#[async_trait]
pub trait MemoryManager: Send + Sync {
    /// Persist a record, assigning an id if `record.id` is empty. Returns the
    /// final id.
    async fn save(&self, record: MemoryRecord) -> Result<String, AgentError>;

    /// Fetch up to `limit` most-recent records of `kind` for `agent_id`.
    async fn recent(&self, agent_id: &str, kind: MemoryKind, limit: usize) -> Result<Vec<MemoryRecord>, AgentError>;

    /// Free-text/semantic search over an agent's long-term memory.
    async fn search(&self, agent_id: &str, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, AgentError>;
}

/// The pub/sub backbone (spec.md §2 C3, §4.3).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish `event` to all subscribers of its topic. Best-effort and
    /// non-blocking: a full subscriber queue drops its oldest entry rather
    /// than applying backpressure to the publisher.
    async fn publish(&self, event: Event);

    /// Subscribe to `topic`, returning a handle usable with [`EventBus::unsubscribe`]
    /// and a receiver. The receiver's capacity is the bound referred to by
    /// "bounded per-subscriber queue"; a slow subscriber that falls behind it
    /// observes [`tokio::sync::broadcast::error::RecvError::Lagged`], i.e.
    /// its oldest unread events are dropped rather than blocking the publisher.
    async fn subscribe(&self, topic: &str) -> (SubscriptionId, tokio::sync::broadcast::Receiver<Event>);

    /// Remove a subscription; further events for its topic are no longer delivered to it.
    async fn unsubscribe(&self, id: &SubscriptionId);
}

/// Durable checkpoint storage (spec.md §2 C8, §4.8).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Save `checkpoint`, assigning the next version for its thread atomically.
    /// Returns the assigned version.
    async fn save(&self, checkpoint: Checkpoint) -> Result<u64, AgentError>;

    /// Load a specific version, or the latest if `version` is `None`.
    async fn load(&self, thread_id: &str, version: Option<u64>) -> Result<Checkpoint, AgentError>;

    /// List checkpoints for `thread_id`, newest first.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, AgentError>;

    /// List version numbers for `thread_id`, oldest first.
    async fn list_versions(&self, thread_id: &str) -> Result<Vec<u64>, AgentError>;
}

/// Human-in-the-loop approval storage (spec.md §2 C9, §4.9).
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Record a new pending request.
    async fn create(&self, request: ApprovalRequest) -> Result<(), AgentError>;

    /// Apply the first disposition received for a request; subsequent calls
    /// for an already-resolved request return [`ApprovalError::AlreadyResolved`].
    async fn resolve(&self, response: ApprovalResponse) -> Result<(), ApprovalError>;

    /// Move a still-pending request directly to `status` (used for
    /// [`crate::approval::ApprovalStatus::TimedOut`] and
    /// [`crate::approval::ApprovalStatus::Cancelled`], which arrive without an
    /// [`ApprovalResponse`]). Subsequent calls for an already-resolved request
    /// return [`ApprovalError::AlreadyResolved`].
    async fn mark_status(&self, id: &str, status: crate::approval::ApprovalStatus) -> Result<(), ApprovalError>;

    /// Fetch a request by id.
    async fn get(&self, id: &str) -> Result<ApprovalRequest, ApprovalError>;
}

/// A tool implementation invocable by the Tool Mediator (spec.md §2 C4).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Stable tool name, matched against `ToolCall::name` and allow-lists.
    fn name(&self) -> &str;

    /// Execute with the given JSON arguments, returning result bytes or an error message.
    async fn invoke(&self, arguments: serde_json::Value, environment: &HashMap<String, String>) -> Result<Vec<u8>, String>;
}

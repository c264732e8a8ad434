//! Core data model, error taxonomy, and collaborator traits shared by every
//! `neuron-*` crate.

pub mod approval;
pub mod checkpoint;
pub mod completion;
pub mod duration;
pub mod error;
pub mod event;
pub mod id;
pub mod io;
pub mod memory;
pub mod message;
pub mod state;
pub mod tool;
pub mod traits;
pub mod validation;

pub use approval::{ApprovalRequest, ApprovalResponse, ApprovalStatus};
pub use checkpoint::{Checkpoint, Diff};
pub use completion::{ChatChunk, ChatRequest, ChatResponse, FinishReason, ToolSchema, TokenUsage};
pub use duration::DurationMs;
pub use error::{AgentError, ApprovalError, LoopError, ProviderError, ToolError};
pub use event::{Event, EventPayload};
pub use id::{AgentId, ApprovalId, CheckpointId, SubscriptionId, ThreadId, ToolCallId, TraceId};
pub use io::{Input, Output, ValueMap};
pub use memory::{MemoryKind, MemoryRecord};
pub use message::{ContentBlock, ContentItem, Message, Role};
pub use state::State;
pub use tool::{ToolCall, ToolContext, ToolResult};
pub use traits::{ApprovalStore, CheckpointStore, EventBus, MemoryManager, ModelProvider, ToolHandler};
pub use validation::{Severity, ValidationError, ValidationResult};

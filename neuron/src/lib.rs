#![deny(missing_docs)]
//! # neuron — umbrella crate
//!
//! Single import surface for the agent core. Re-exports each component
//! behind a feature flag, plus a `prelude` for the happy path.

pub use neuron_types as types;

#[cfg(feature = "core")]
pub use neuron_events as events;
#[cfg(feature = "core")]
pub use neuron_memory as memory;
#[cfg(feature = "core")]
pub use neuron_state as state;

#[cfg(feature = "tool")]
pub use neuron_tool as tool;

#[cfg(feature = "guardrails")]
pub use neuron_guardrails as guardrails;

#[cfg(feature = "react")]
pub use neuron_loop as react_loop;

#[cfg(feature = "checkpoint")]
pub use neuron_checkpoint as checkpoint;

#[cfg(feature = "approval")]
pub use neuron_approval as approval;

#[cfg(feature = "subagent")]
pub use neuron_subagent as subagent;

#[cfg(feature = "agent")]
pub use neuron_agent as agent;

/// Happy-path imports for composing agents.
pub mod prelude {
    pub use neuron_types::{
        AgentError, AgentId, ChatRequest, ChatResponse, Checkpoint, ContentBlock, Event,
        EventPayload, Input, Message, ModelProvider, Output, Role, State, ThreadId, ToolCall,
        ToolContext, ToolResult, ValidationResult,
    };

    #[cfg(feature = "core")]
    pub use neuron_state::StateMachine;

    #[cfg(feature = "core")]
    pub use neuron_events::InMemoryEventBus;

    #[cfg(feature = "core")]
    pub use neuron_memory::MemoryCoordinator;

    #[cfg(feature = "tool")]
    pub use neuron_tool::ToolMediator;

    #[cfg(feature = "guardrails")]
    pub use neuron_guardrails::{GuardrailsPipeline, ValidatorChainMode};

    #[cfg(feature = "react")]
    pub use neuron_loop::{ReActConfig, ReActExecutor};

    #[cfg(feature = "checkpoint")]
    pub use neuron_checkpoint::{CheckpointManager, InMemoryCheckpointStore};

    #[cfg(feature = "approval")]
    pub use neuron_approval::{ApprovalCoordinator, InMemoryApprovalStore};

    #[cfg(feature = "subagent")]
    pub use neuron_subagent::SubagentScheduler;

    #[cfg(feature = "agent")]
    pub use neuron_agent::Agent;
}

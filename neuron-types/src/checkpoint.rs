//! Checkpoint/versioning types (spec.md §3 `Checkpoint`, §4.8 `compare`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::state::State;

/// A saved snapshot of one thread's conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Thread this checkpoint belongs to.
    pub thread_id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Monotonically increasing version within `thread_id`, starting at 1.
    pub version: u64,
    /// The agent's lifecycle state at save time.
    pub state: State,
    /// The full message transcript at save time.
    pub messages: Vec<Message>,
    /// Arbitrary caller-supplied metadata (e.g. a save reason).
    pub metadata: HashMap<String, serde_json::Value>,
    /// Save timestamp.
    pub created_at: DateTime<Utc>,
}

/// The result of comparing two versions of the same thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    /// Thread the compared versions belong to.
    pub thread_id: String,
    /// The earlier version number.
    pub v1: u64,
    /// The later version number.
    pub v2: u64,
    /// Whether `state` differs between the two versions.
    pub state_changed: bool,
    /// State at `v1`.
    pub old_state: State,
    /// State at `v2`.
    pub new_state: State,
    /// Number of messages appended between `v1` and `v2`.
    pub messages_added: usize,
    /// Wall-clock time between the two saves.
    pub time_diff: chrono::Duration,
}

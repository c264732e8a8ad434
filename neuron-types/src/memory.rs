//! Memory record types persisted/read through a [`crate::traits::MemoryManager`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of memory a [`MemoryRecord`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Bounded-size recent context, seeded into `recentMemory` at Init.
    ShortTerm,
    /// Scratch state for the duration of one task.
    Working,
    /// Search-indexable durable memory.
    LongTerm,
    /// A record of a single past episode/interaction (e.g. feedback).
    Episodic,
}

/// A single memory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier, assigned by the manager if left empty on save.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Which memory kind this record belongs to.
    pub kind: MemoryKind,
    /// The record's textual content.
    pub content: String,
    /// Arbitrary metadata (e.g. `role`, `feedback_type`).
    pub metadata: HashMap<String, serde_json::Value>,
    /// Optional vector-store id for semantic search backends.
    pub vector_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional expiry, after which the record may be purged.
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Build a new record with the given agent, kind, and content.
    ///
    /// `id` is left empty; the store assigns one on `save` if so.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            agent_id: agent_id.into(),
            kind,
            content: content.into(),
            metadata: HashMap::new(),
            vector_id: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Attach a metadata key/value, builder-style.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

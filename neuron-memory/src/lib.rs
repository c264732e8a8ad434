//! Memory coordinator (spec.md §2 C2).
//!
//! Wraps an optional [`MemoryManager`] with a bounded, copy-on-read
//! `recentMemory` cache so the hot path (reading recent turns back into a
//! prompt) never awaits the backing store. When no manager is configured the
//! coordinator degrades to cache-only, no-op-on-persist behavior.

use std::collections::HashMap;
use std::sync::RwLock;

use neuron_types::memory::{MemoryKind, MemoryRecord};
use neuron_types::{AgentError, MemoryManager};

const DEFAULT_CACHE_SIZE: usize = 64;

/// Coordinates reads/writes against short-term cache and long-term storage.
pub struct MemoryCoordinator {
    agent_id: String,
    manager: Option<std::sync::Arc<dyn MemoryManager>>,
    cache_size: usize,
    recent: RwLock<HashMap<MemoryKind, Vec<MemoryRecord>>>,
}

impl MemoryCoordinator {
    /// Build a coordinator with no backing store; everything lives in the cache.
    #[must_use]
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::with_manager(agent_id, None)
    }

    /// Build a coordinator backed by `manager` (if any).
    #[must_use]
    pub fn with_manager(agent_id: impl Into<String>, manager: Option<std::sync::Arc<dyn MemoryManager>>) -> Self {
        Self {
            agent_id: agent_id.into(),
            manager,
            cache_size: DEFAULT_CACHE_SIZE,
            recent: RwLock::new(HashMap::new()),
        }
    }

    /// Persist `record` (if a manager is configured) and push it into the
    /// recent-memory cache for its kind, evicting the oldest entry if full.
    pub async fn remember(&self, mut record: MemoryRecord) -> Result<String, AgentError> {
        record.agent_id = self.agent_id.clone();
        let id = if let Some(manager) = &self.manager {
            manager.save(record.clone()).await?
        } else {
            record.id.clone()
        };
        record.id = id.clone();

        let mut cache = self.recent.write().unwrap();
        let bucket = cache.entry(record.kind).or_default();
        bucket.push(record);
        if bucket.len() > self.cache_size {
            bucket.remove(0);
        }
        Ok(id)
    }

    /// Return up to `limit` most-recent cached records of `kind`, falling
    /// back to the backing store when the cache doesn't have enough. Always
    /// a clone of cached state (copy-on-read): callers never see mutations
    /// made after this call returns.
    pub async fn recent(&self, kind: MemoryKind, limit: usize) -> Result<Vec<MemoryRecord>, AgentError> {
        let cached: Vec<MemoryRecord> = {
            let cache = self.recent.read().unwrap();
            cache
                .get(&kind)
                .map(|records| {
                    records
                        .iter()
                        .rev()
                        .take(limit)
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };
        if cached.len() >= limit || self.manager.is_none() {
            return Ok(cached);
        }
        self.manager
            .as_ref()
            .unwrap()
            .recent(&self.agent_id, kind, limit)
            .await
    }

    /// Delegate to the backing store's search; an empty result when none is configured.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<MemoryRecord>, AgentError> {
        match &self.manager {
            Some(manager) => manager.search(&self.agent_id, query, limit).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remember_without_manager_is_cache_only() {
        let coordinator = MemoryCoordinator::new("agent-1");
        coordinator
            .remember(MemoryRecord::new("agent-1", MemoryKind::ShortTerm, "hello"))
            .await
            .unwrap();
        let recent = coordinator.recent(MemoryKind::ShortTerm, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn recent_respects_limit_and_newest_first() {
        let coordinator = MemoryCoordinator::new("agent-1");
        for i in 0..5 {
            coordinator
                .remember(MemoryRecord::new("agent-1", MemoryKind::Working, format!("turn-{i}")))
                .await
                .unwrap();
        }
        let recent = coordinator.recent(MemoryKind::Working, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "turn-4");
        assert_eq!(recent[1].content, "turn-3");
    }

    #[tokio::test]
    async fn search_without_manager_is_empty() {
        let coordinator = MemoryCoordinator::new("agent-1");
        assert!(coordinator.search("anything", 5).await.unwrap().is_empty());
    }
}

//! Checkpoint subsystem (spec.md §2 C8, §4.8).

pub mod file_store;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use neuron_types::checkpoint::{Checkpoint, Diff};
use neuron_types::{AgentError, CheckpointStore};

pub use file_store::FileCheckpointStore;

struct ThreadLog {
    /// Assigned independently of `checkpoints.len()` so a future delete/prune
    /// operation can never cause a version to be reused.
    next_version: u64,
    checkpoints: Vec<Checkpoint>,
}

/// In-memory [`CheckpointStore`]; the default for tests and ephemeral agents.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: Mutex<HashMap<String, ThreadLog>>,
}

impl InMemoryCheckpointStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, mut checkpoint: Checkpoint) -> Result<u64, AgentError> {
        let mut threads = self.threads.lock().unwrap();
        let log = threads.entry(checkpoint.thread_id.clone()).or_insert_with(|| ThreadLog {
            next_version: 1,
            checkpoints: Vec::new(),
        });
        let version = log.next_version;
        log.next_version += 1;
        checkpoint.version = version;
        log.checkpoints.push(checkpoint);
        Ok(version)
    }

    async fn load(&self, thread_id: &str, version: Option<u64>) -> Result<Checkpoint, AgentError> {
        let threads = self.threads.lock().unwrap();
        let log = threads
            .get(thread_id)
            .ok_or_else(|| AgentError::CheckpointNotFound { thread_id: thread_id.to_owned(), version })?;
        let found = match version {
            Some(v) => log.checkpoints.iter().find(|c| c.version == v),
            None => log.checkpoints.last(),
        };
        found
            .cloned()
            .ok_or_else(|| AgentError::CheckpointNotFound { thread_id: thread_id.to_owned(), version })
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, AgentError> {
        let threads = self.threads.lock().unwrap();
        let mut checkpoints = threads.get(thread_id).map(|log| log.checkpoints.clone()).unwrap_or_default();
        checkpoints.sort_by_key(|c| std::cmp::Reverse(c.version));
        Ok(checkpoints)
    }

    async fn list_versions(&self, thread_id: &str) -> Result<Vec<u64>, AgentError> {
        let threads = self.threads.lock().unwrap();
        let mut versions: Vec<u64> = threads
            .get(thread_id)
            .map(|log| log.checkpoints.iter().map(|c| c.version).collect())
            .unwrap_or_default();
        versions.sort_unstable();
        Ok(versions)
    }
}

/// Thin convenience layer over a [`CheckpointStore`]: `rollback` and `compare`.
pub struct CheckpointManager {
    store: std::sync::Arc<dyn CheckpointStore>,
    auto_save: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl CheckpointManager {
    /// Wrap a store.
    #[must_use]
    pub fn new(store: std::sync::Arc<dyn CheckpointStore>) -> Self {
        Self { store, auto_save: Mutex::new(None) }
    }

    /// Start calling `snapshot` every `interval` and saving its result, until
    /// [`CheckpointManager::disable_auto_save`] is called or the manager is
    /// dropped (spec.md §4.8: "auto-save: a configurable interval timer").
    pub fn enable_auto_save<F>(self: &std::sync::Arc<Self>, interval: std::time::Duration, mut snapshot: F)
    where
        F: FnMut() -> Checkpoint + Send + 'static,
    {
        let this = std::sync::Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let _ = this.store.save(snapshot()).await;
            }
        });
        *self.auto_save.lock().unwrap() = Some(handle);
    }

    /// Stop the auto-save timer started by `enable_auto_save`, if any.
    pub fn disable_auto_save(&self) {
        if let Some(handle) = self.auto_save.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// Save a snapshot, returning the assigned version.
    pub async fn save(&self, checkpoint: Checkpoint) -> Result<u64, AgentError> {
        self.store.save(checkpoint).await
    }

    /// Roll `thread_id` back to `version`: loads that snapshot and persists
    /// it again as a brand-new checkpoint, so the version sequence keeps
    /// growing forward rather than rewinding (spec.md §4.8: "rollback never
    /// removes history"). Returns the new checkpoint, which callers use to
    /// restore the agent's live state and message transcript.
    pub async fn rollback(&self, thread_id: &str, version: u64) -> Result<Checkpoint, AgentError> {
        let target = self.store.load(thread_id, Some(version)).await?;
        let mut restored = target.clone();
        restored.version = 0;
        restored.created_at = chrono::Utc::now();
        restored.metadata.insert("rolled_back_from".to_owned(), serde_json::Value::from(version));
        let new_version = self.store.save(restored).await?;
        self.store.load(thread_id, Some(new_version)).await
    }

    /// Compare two versions of the same thread.
    pub async fn compare(&self, thread_id: &str, v1: u64, v2: u64) -> Result<Diff, AgentError> {
        let a = self.store.load(thread_id, Some(v1)).await?;
        let b = self.store.load(thread_id, Some(v2)).await?;
        Ok(Diff {
            thread_id: thread_id.to_owned(),
            v1,
            v2,
            state_changed: a.state != b.state,
            old_state: a.state,
            new_state: b.state,
            messages_added: b.messages.len().saturating_sub(a.messages.len()),
            time_diff: b.created_at - a.created_at,
        })
    }

    /// List versions for `thread_id`, newest first.
    pub async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, AgentError> {
        self.store.list(thread_id).await
    }

    /// List version numbers for `thread_id`, oldest first.
    pub async fn list_versions(&self, thread_id: &str) -> Result<Vec<u64>, AgentError> {
        self.store.list_versions(thread_id).await
    }
}

impl Drop for CheckpointManager {
    fn drop(&mut self) {
        self.disable_auto_save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuron_types::State;
    use chrono::Utc;

    fn checkpoint(thread_id: &str, state: State) -> Checkpoint {
        Checkpoint {
            thread_id: thread_id.to_owned(),
            agent_id: "agent-1".to_owned(),
            version: 0,
            state,
            messages: Vec::new(),
            metadata: Default::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn versions_are_monotonic_per_thread() {
        let store = InMemoryCheckpointStore::new();
        let v1 = store.save(checkpoint("t1", State::Running)).await.unwrap();
        let v2 = store.save(checkpoint("t1", State::Completed)).await.unwrap();
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn threads_have_independent_version_spaces() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("t1", State::Running)).await.unwrap();
        let v = store.save(checkpoint("t2", State::Running)).await.unwrap();
        assert_eq!(v, 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_list_versions_is_oldest_first() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("t1", State::Running)).await.unwrap();
        store.save(checkpoint("t1", State::Completed)).await.unwrap();

        let listed = store.list("t1").await.unwrap();
        assert_eq!(listed[0].version, 2);
        assert_eq!(listed[1].version, 1);

        let versions = store.list_versions("t1").await.unwrap();
        assert_eq!(versions, vec![1, 2]);
    }

    #[tokio::test]
    async fn load_missing_version_errors() {
        let store = InMemoryCheckpointStore::new();
        store.save(checkpoint("t1", State::Running)).await.unwrap();
        let err = store.load("t1", Some(99)).await.unwrap_err();
        assert!(matches!(err, AgentError::CheckpointNotFound { .. }));
    }

    #[tokio::test]
    async fn rollback_persists_a_new_checkpoint_without_rewriting_history() {
        let store = std::sync::Arc::new(InMemoryCheckpointStore::new());
        store.save(checkpoint("t1", State::Init)).await.unwrap();
        store.save(checkpoint("t1", State::Running)).await.unwrap();
        store.save(checkpoint("t1", State::Completed)).await.unwrap();
        let manager = CheckpointManager::new(store);

        let restored = manager.rollback("t1", 1).await.unwrap();
        assert_eq!(restored.version, 4);
        assert_eq!(restored.state, State::Init);

        let versions = manager.list_versions("t1").await.unwrap();
        assert_eq!(versions, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn auto_save_runs_until_disabled() {
        let store = std::sync::Arc::new(InMemoryCheckpointStore::new());
        let manager = std::sync::Arc::new(CheckpointManager::new(store));
        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        manager.enable_auto_save(std::time::Duration::from_millis(10), move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            checkpoint("t1", State::Running)
        });
        tokio::time::sleep(std::time::Duration::from_millis(35)).await;
        manager.disable_auto_save();
        let seen = calls.load(std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(35)).await;
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), seen);
        assert!(seen >= 1);
    }

    #[tokio::test]
    async fn compare_reports_state_change() {
        let store = std::sync::Arc::new(InMemoryCheckpointStore::new());
        store.save(checkpoint("t1", State::Running)).await.unwrap();
        store.save(checkpoint("t1", State::Completed)).await.unwrap();
        let manager = CheckpointManager::new(store);
        let diff = manager.compare("t1", 1, 2).await.unwrap();
        assert!(diff.state_changed);
        assert_eq!(diff.old_state, State::Running);
        assert_eq!(diff.new_state, State::Completed);
    }
}

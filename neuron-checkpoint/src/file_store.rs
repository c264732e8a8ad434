//! File-backed [`CheckpointStore`]: one JSON file per thread.

use std::path::PathBuf;

use async_trait::async_trait;
use neuron_types::checkpoint::Checkpoint;
use neuron_types::{AgentError, CheckpointStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

#[derive(Serialize, Deserialize, Default)]
struct ThreadFile {
    next_version: u64,
    checkpoints: Vec<Checkpoint>,
}

/// Stores each thread's checkpoints as `<dir>/<thread_id>.json`.
///
/// Writes are serialized through an in-process mutex and committed via a
/// write-to-temp-then-rename so a crash mid-write never corrupts the file.
pub struct FileCheckpointStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    /// Use `dir` as the checkpoint directory, creating it if missing.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, thread_id: &str) -> PathBuf {
        self.dir.join(format!("{thread_id}.json"))
    }

    async fn read(&self, thread_id: &str) -> Result<ThreadFile, AgentError> {
        let path = self.path_for(thread_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| AgentError::Storage(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ThreadFile::default()),
            Err(e) => Err(AgentError::Storage(e.to_string())),
        }
    }

    async fn write(&self, thread_id: &str, file: &ThreadFile) -> Result<(), AgentError> {
        let path = self.path_for(thread_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(file).map_err(|e| AgentError::Storage(e.to_string()))?;
        tokio::fs::write(&tmp, bytes).await.map_err(|e| AgentError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| AgentError::Storage(e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, mut checkpoint: Checkpoint) -> Result<u64, AgentError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.read(&checkpoint.thread_id).await?;
        if file.next_version == 0 {
            file.next_version = 1;
        }
        let version = file.next_version;
        file.next_version += 1;
        checkpoint.version = version;
        let thread_id = checkpoint.thread_id.clone();
        file.checkpoints.push(checkpoint);
        self.write(&thread_id, &file).await?;
        Ok(version)
    }

    async fn load(&self, thread_id: &str, version: Option<u64>) -> Result<Checkpoint, AgentError> {
        let file = self.read(thread_id).await?;
        let found = match version {
            Some(v) => file.checkpoints.into_iter().find(|c| c.version == v),
            None => file.checkpoints.into_iter().last(),
        };
        found.ok_or_else(|| AgentError::CheckpointNotFound { thread_id: thread_id.to_owned(), version })
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, AgentError> {
        let mut checkpoints = self.read(thread_id).await?.checkpoints;
        checkpoints.sort_by_key(|c| std::cmp::Reverse(c.version));
        Ok(checkpoints)
    }

    async fn list_versions(&self, thread_id: &str) -> Result<Vec<u64>, AgentError> {
        let mut versions: Vec<u64> = self.read(thread_id).await?.checkpoints.iter().map(|c| c.version).collect();
        versions.sort_unstable();
        Ok(versions)
    }
}

//! Agent snapshot persistence.
//!
//! The coordinator only needs `load`/`save`; where snapshots live is up to
//! the [`StateStore`] implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::agent::AgentSnapshot;
use crate::error::{Error, Result};

/// Storage collaborator for agent snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads an agent; `None` when nothing was saved.
    async fn load(&self, agent_id: &str) -> Result<Option<AgentSnapshot>>;

    /// Saves an agent, replacing any previous snapshot.
    async fn save(&self, agent_id: &str, snapshot: &AgentSnapshot) -> Result<()>;

    /// Deletes an agent's snapshot. Returns whether one existed.
    async fn delete(&self, agent_id: &str) -> Result<bool>;

    /// Ids with a stored snapshot, sorted.
    async fn list(&self) -> Result<Vec<String>>;
}

/// Keeps snapshots in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshots: RwLock<FxHashMap<String, AgentSnapshot>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentSnapshot>> {
        Ok(self.snapshots.read().get(agent_id).cloned())
    }

    async fn save(&self, agent_id: &str, snapshot: &AgentSnapshot) -> Result<()> {
        self.snapshots
            .write()
            .insert(agent_id.to_string(), snapshot.clone());
        Ok(())
    }

    async fn delete(&self, agent_id: &str) -> Result<bool> {
        Ok(self.snapshots.write().remove(agent_id).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.snapshots.read().keys().cloned().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// One `<agentId>.json` file per agent under a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// crash never leaves a half-written snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates if needed) the snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, agent_id: &str) -> Result<PathBuf> {
        let safe = !agent_id.is_empty()
            && !agent_id.starts_with('.')
            && agent_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(Error::Storage(format!(
                "agent id '{agent_id}' is not usable as a file name"
            )));
        }
        Ok(self.dir.join(format!("{agent_id}.json")))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentSnapshot>> {
        let path = self.path_for(agent_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: AgentSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.agent_id != agent_id {
            return Err(Error::Storage(format!(
                "{} holds agent '{}'",
                path.display(),
                snapshot.agent_id
            )));
        }
        Ok(Some(snapshot))
    }

    async fn save(&self, agent_id: &str, snapshot: &AgentSnapshot) -> Result<()> {
        let path = self.path_for(agent_id)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(agent_id, path = %path.display(), bytes = bytes.len(), "saved agent snapshot");
        Ok(())
    }

    async fn delete(&self, agent_id: &str) -> Result<bool> {
        let path = self.path_for(agent_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EpisodicMemory, NewEvent};
    use crate::spatial::{AgentPosition, Tile};
    use tempfile::TempDir;

    fn snapshot(agent_id: &str) -> AgentSnapshot {
        let mut memory = EpisodicMemory::default();
        memory
            .add_event(NewEvent::new(4, "hall", "moved to (12,10), saw a lamp", 4).with_tags(["lamp"]))
            .unwrap();
        AgentSnapshot {
            agent_id: agent_id.to_string(),
            position: AgentPosition {
                tile: Tile::new(12, 10),
                room: None,
                updated_at: 4,
            },
            memory: memory.snapshot(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_store_round_trip() {
        let store = InMemoryStore::new();

        store.save("a1", &snapshot("a1")).await.unwrap();

        assert_eq!(store.load("a1").await.unwrap(), Some(snapshot("a1")));
        assert_eq!(store.load("zz").await.unwrap(), None);
        assert_eq!(store.list().await.unwrap(), vec!["a1".to_string()]);
        assert!(store.delete("a1").await.unwrap());
        assert!(!store.delete("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_file_store_round_trip() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("agents")).unwrap();

        // Act
        store.save("a1", &snapshot("a1")).await.unwrap();
        store.save("b-2", &snapshot("b-2")).await.unwrap();

        // Assert
        assert!(dir.path().join("agents").join("a1.json").exists());
        assert!(!dir.path().join("agents").join("a1.json.tmp").exists());
        assert_eq!(store.load("a1").await.unwrap(), Some(snapshot("a1")));
        assert_eq!(store.list().await.unwrap(), vec!["a1".to_string(), "b-2".to_string()]);
    }

    #[tokio::test]
    async fn test_json_file_store_missing_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert_eq!(store.load("ghost").await.unwrap(), None);
        store.save("a1", &snapshot("a1")).await.unwrap();
        assert!(store.delete("a1").await.unwrap());
        assert!(!store.delete("a1").await.unwrap());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_unsafe_ids() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        for id in ["../escape", "", ".hidden", "a/b"] {
            assert!(matches!(
                store.save(id, &snapshot(id)).await,
                Err(Error::Storage(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_json_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("a1.json"), b"{not json").unwrap();

        let result = store.load("a1").await;

        assert!(matches!(result, Err(Error::Serialization(_))));
    }
}

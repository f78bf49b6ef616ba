//! Small string values under fixed keys.

use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::paths::{atomic_write, kv_path, remove_if_exists};

/// Trait for key/value stores.
pub trait KeyValueStore: Send + Sync {
    /// Get a value. Absent keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any existing one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}

/// One file per key under `<root>/kv/`.
pub struct FsKeyValueStore {
    root: Arc<Path>,
}

impl FsKeyValueStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| anyhow!("Failed to create state root {}: {}", root.display(), e))?;
        Ok(Self {
            root: Arc::from(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl KeyValueStore for FsKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = kv_path(&self.root, key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("Failed to read {}: {}", path.display(), e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        atomic_write(&kv_path(&self.root, key), value.as_bytes())
    }

    fn remove(&self, key: &str) -> Result<()> {
        remove_if_exists(&kv_path(&self.root, key))
    }
}

/// In-memory key/value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &dyn KeyValueStore) -> Result<()> {
        assert_eq!(store.get("k")?, None);
        store.set("k", "v1")?;
        store.set("k", "v2")?;
        assert_eq!(store.get("k")?.as_deref(), Some("v2"));
        store.remove("k")?;
        store.remove("k")?;
        assert_eq!(store.get("k")?, None);
        Ok(())
    }

    #[test]
    fn test_fs_store() -> Result<()> {
        let temp_dir = TempDir::new()?;
        exercise(&FsKeyValueStore::new(temp_dir.path())?)
    }

    #[test]
    fn test_memory_store() -> Result<()> {
        exercise(&MemoryKeyValueStore::new())
    }

    #[test]
    fn test_fs_store_persists_across_instances() -> Result<()> {
        let temp_dir = TempDir::new()?;
        FsKeyValueStore::new(temp_dir.path())?.set("key", "[\"0x1\"]")?;
        let reopened = FsKeyValueStore::new(temp_dir.path())?;
        assert_eq!(reopened.get("key")?.as_deref(), Some("[\"0x1\"]"));
        Ok(())
    }
}

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::SectionStore;

/// File name of the persisted section store inside the cache directory.
pub const STORE_FILE: &str = "sections.json";

/// Synchronous persistence for the section store.
pub trait LocalStorage: Send + Sync {
    fn load(&self) -> Result<Option<SectionStore>>;
    fn save(&self, store: &SectionStore) -> Result<()>;
}

/// JSON file in the per-tenant cache directory.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(STORE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStorage for FileStorage {
    fn load(&self) -> Result<Option<SectionStore>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read section store {}", self.path.display()))?;
        let store = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse section store {}", self.path.display()))?;
        Ok(Some(store))
    }

    fn save(&self, store: &SectionStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string(store)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write section store {}", self.path.display()))?;
        Ok(())
    }
}

/// Process-local storage, used when no cache directory is available.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Option<SectionStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: SectionStore) -> Self {
        Self {
            inner: Mutex::new(Some(store)),
        }
    }
}

impl LocalStorage for MemoryStorage {
    fn load(&self) -> Result<Option<SectionStore>> {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, store: &SectionStore) -> Result<()> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(store.clone());
        Ok(())
    }
}

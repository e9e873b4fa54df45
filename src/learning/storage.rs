use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use super::GlobalPatternStore;

/// Injected persistence seam for the pattern store. Callers construct and
/// own one store per process; tests swap in `MemoryStorage`.
#[async_trait]
pub trait PatternStorage: Send + Sync {
    /// `Ok(None)` means "no usable store": missing and corrupt files are
    /// both treated as an empty store, never a hard failure.
    async fn load(&self) -> Result<Option<GlobalPatternStore>>;
    async fn save(&self, store: &GlobalPatternStore) -> Result<()>;
}

/// Whole-file JSON persistence. Each save overwrites the entire document;
/// concurrent processes writing the same path are not coordinated. This is
/// a documented single-process assumption, not a guarantee.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PatternStorage for JsonFileStorage {
    async fn load(&self) -> Result<Option<GlobalPatternStore>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        match serde_json::from_str(&content) {
            Ok(store) => Ok(Some(store)),
            Err(e) => {
                warn!(path = %self.path.display(), "corrupt pattern store, starting empty: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, store: &GlobalPatternStore) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(store)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// In-memory persistence stub for test isolation.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Mutex<Option<GlobalPatternStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<GlobalPatternStore>> {
        Ok(self.inner.lock().unwrap().clone())
    }

    async fn save(&self, store: &GlobalPatternStore) -> Result<()> {
        *self.inner.lock().unwrap() = Some(store.clone());
        Ok(())
    }
}

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::RecordResult;

/// Key-value storage area shared between execution contexts
#[async_trait]
pub trait SharedStorage: Send + Sync {
    /// Read the given keys; missing keys are absent from the result
    async fn get(&self, keys: &[&str]) -> RecordResult<Map<String, Value>>;

    /// Merge the given items into the area
    async fn set(&self, items: Map<String, Value>) -> RecordResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<Map<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStorage for MemoryStorage {
    async fn get(&self, keys: &[&str]) -> RecordResult<Map<String, Value>> {
        let items = self.items.read().await;
        Ok(select(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> RecordResult<()> {
        let mut items = self.items.write().await;
        items.extend(new_items);
        Ok(())
    }
}

/// Storage area persisted as a single JSON object on disk
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> RecordResult<Map<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SharedStorage for FileStorage {
    async fn get(&self, keys: &[&str]) -> RecordResult<Map<String, Value>> {
        let items = self.read_all().await?;
        Ok(select(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> RecordResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.read_all().await?;
        items.extend(new_items);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a reader never sees a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&items)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("Storage written: {}", self.path.display());
        Ok(())
    }
}

fn select(items: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| items.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect()
}

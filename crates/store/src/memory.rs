//! In-memory store (for testing)

use crate::{validate_id, ContentStore, Result, Update};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Map-backed [`ContentStore`] that also counts successful writes
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write`/`create`/`update` calls that changed the store
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored artifact
    pub async fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(self.entries.read().await.contains_key(id))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        validate_id(id)?;
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn write(&self, id: &str, value: &Value) -> Result<()> {
        validate_id(id)?;
        self.entries.write().await.insert(id.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create(&self, id: &str, value: &Value) -> Result<bool> {
        validate_id(id)?;
        let mut entries = self.entries.write().await;
        if entries.contains_key(id) {
            return Ok(false);
        }
        entries.insert(id.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn update(&self, id: &str, update: Update<'_>) -> Result<Option<Value>> {
        validate_id(id)?;
        let mut entries = self.entries.write().await;
        let current = entries.get(id).cloned();
        match update(current.clone())? {
            Some(next) => {
                entries.insert(id.to_string(), next.clone());
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(Some(next))
            }
            None => Ok(current),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

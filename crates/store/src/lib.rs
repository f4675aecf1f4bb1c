//! Keyed persistence for per-id JSON artifacts
//!
//! Every stage writes one JSON object per document or chunk id. The
//! [`ContentStore`] capability is the only shared state between workers:
//! `exists` before work, `create` to publish (first writer wins), `update`
//! to merge into a shared artifact, `write` to replace.

pub mod error;
pub mod json_dir;
pub mod memory;

pub use error::{Result, StoreError};
pub use json_dir::JsonDirStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Read-modify-write step for [`ContentStore::update`]. Receives the
/// stored artifact and returns the replacement, or `None` to leave it as is.
pub type Update<'a> = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>> + Send + 'a>;

/// Per-id JSON artifact storage
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether an artifact is stored under `id`
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Read the artifact, `None` if absent
    async fn read(&self, id: &str) -> Result<Option<Value>>;

    /// Store the artifact, replacing any previous one
    async fn write(&self, id: &str, value: &Value) -> Result<()>;

    /// Store the artifact only if none exists yet.
    /// Returns `false` when another writer got there first.
    async fn create(&self, id: &str, value: &Value) -> Result<bool>;

    /// Apply `update` to the artifact with no other `update` on the same id
    /// in between. Returns the artifact as stored afterwards.
    async fn update(&self, id: &str, update: Update<'_>) -> Result<Option<Value>>;

    /// Delete the artifact. Returns whether one was present.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// All stored ids, sorted
    async fn list_ids(&self) -> Result<Vec<String>>;
}

/// Typed helpers over [`ContentStore`]
#[async_trait]
pub trait ContentStoreExt: ContentStore {
    async fn read_as<T>(&self, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.read(id).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    id: id.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    async fn write_as<T>(&self, id: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.write(id, &value).await
    }

    async fn create_as<T>(&self, id: &str, value: &T) -> Result<bool>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.create(id, &value).await
    }

    /// Typed [`ContentStore::update`]: `f` sees the stored artifact and
    /// returns the replacement, or `None` to keep it
    async fn update_as<T, F>(&self, id: &str, f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce(Option<T>) -> Option<T> + Send,
    {
        let key = id.to_string();
        let step: Update<'_> = Box::new(move |current: Option<Value>| -> Result<Option<Value>> {
            let current = current
                .map(serde_json::from_value::<T>)
                .transpose()
                .map_err(|source| StoreError::Corrupt { id: key, source })?;
            Ok(f(current).map(|next| serde_json::to_value(&next)).transpose()?)
        });

        match self.update(id, step).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    id: id.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

impl<S: ContentStore + ?Sized> ContentStoreExt for S {}

/// Reject ids that would escape the store directory or hide as dotfiles
pub fn validate_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || id.trim() != id;
    if invalid {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

//! Directory-backed store: one `id.json` file per artifact

use crate::{validate_id, ContentStore, Result, StoreError, Update};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, instrument, warn};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How often a blocked `update` checks the lock again
const LOCK_POLL: Duration = Duration::from_millis(10);

/// A lock file older than this was left behind by a dead process
const LOCK_STALE: Duration = Duration::from_secs(30);

/// Held while an `update` runs; removes the lock file when dropped
struct UpdateLock {
    path: PathBuf,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn is_stale(lock: &Path) -> bool {
    match fs::metadata(lock).await.and_then(|meta| meta.modified()) {
        Ok(modified) => modified
            .elapsed()
            .map(|age| age > LOCK_STALE)
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Store artifacts as pretty-printed JSON under `directory/id.json`.
///
/// Writes go through a temporary file so readers never observe a partial
/// artifact. `create` publishes with a hard link, which fails if the target
/// exists, giving first-writer-wins semantics across processes. `update`
/// holds a `.id.json.lock` file, created exclusively, for its whole
/// read-modify-write, so merges from any process are serialized.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path an artifact lives at
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn tmp_path(&self, id: &str) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{id}.json.{}.{n}.tmp", std::process::id()))
    }

    /// Wait until this caller holds the lock file for `id`
    async fn lock(&self, id: &str) -> Result<UpdateLock> {
        let path = self.dir.join(format!(".{id}.json.lock"));
        loop {
            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;
            match opened {
                Ok(_) => return Ok(UpdateLock { path }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path).await {
                        warn!(lock = %path.display(), "Breaking stale lock");
                        let _ = fs::remove_file(&path).await;
                        continue;
                    }
                    tokio::time::sleep(LOCK_POLL).await;
                }
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
    }

    async fn write_tmp(&self, id: &str, value: &Value) -> Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = self.tmp_path(id);
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        Ok(tmp)
    }
}

#[async_trait]
impl ContentStore for JsonDirStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let path = self.path_for(id);
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn read(&self, id: &str) -> Result<Option<Value>> {
        validate_id(id)?;
        let path = self.path_for(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                id: id.to_string(),
                source,
            })
    }

    #[instrument(skip(self, value))]
    async fn write(&self, id: &str, value: &Value) -> Result<()> {
        validate_id(id)?;
        let tmp = self.write_tmp(id, value).await?;
        let path = self.path_for(id);
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(path, e));
        }
        debug!("Wrote {}", path.display());
        Ok(())
    }

    #[instrument(skip(self, value))]
    async fn create(&self, id: &str, value: &Value) -> Result<bool> {
        validate_id(id)?;
        let tmp = self.write_tmp(id, value).await?;
        let path = self.path_for(id);
        let linked = fs::hard_link(&tmp, &path).await;
        let _ = fs::remove_file(&tmp).await;

        match linked {
            Ok(()) => {
                debug!("Created {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} already exists, keeping first write", path.display());
                Ok(false)
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: &str, update: Update<'_>) -> Result<Option<Value>> {
        validate_id(id)?;
        let _lock = self.lock(id).await?;

        let current = self.read(id).await?;
        match update(current.clone())? {
            Some(next) => {
                self.write(id, &next).await?;
                Ok(Some(next))
            }
            None => Ok(current),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let path = self.path_for(id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let mut ids = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentStoreExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path().join("meta")).await.unwrap();

        assert!(!store.exists("c1").await.unwrap());
        store.write("c1", &json!({"a": 1})).await.unwrap();

        assert!(store.exists("c1").await.unwrap());
        assert_eq!(store.read("c1").await.unwrap(), Some(json!({"a": 1})));
        assert!(store.path_for("c1").ends_with("meta/c1.json"));
        assert_eq!(store.read("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_is_first_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();

        assert!(store.create("c1", &json!({"writer": 1})).await.unwrap());
        assert!(!store.create("c1", &json!({"writer": 2})).await.unwrap());

        let stored: serde_json::Value = store.read_as("c1").await.unwrap().unwrap();
        assert_eq!(stored["writer"], 1);
    }

    #[tokio::test]
    async fn test_list_ids_skips_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();

        store.write("b", &json!({})).await.unwrap();
        store.write("a", &json!({})).await.unwrap();
        std::fs::write(dir.path().join(".a.json.1.0.tmp"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        assert_eq!(store.list_ids().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();

        assert!(matches!(
            store.read("bad").await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_rewrite_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        let value = json!({"z": [1, 2], "a": "x"});

        store.write("d", &value).await.unwrap();
        let first = std::fs::read(store.path_for("d")).unwrap();
        store.write("d", &value).await.unwrap();
        let second = std::fs::read(store.path_for("d")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();

        let updates = (0..16).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_as("tally", move |current: Option<Vec<u32>>| {
                        let mut seen = current.unwrap_or_default();
                        seen.push(i);
                        Some(seen)
                    })
                    .await
                    .unwrap()
            })
        });
        for handle in updates.collect::<Vec<_>>() {
            handle.await.unwrap();
        }

        let mut seen: Vec<u32> = store.read_as("tally").await.unwrap().unwrap();
        seen.sort();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
        assert!(!dir.path().join(".tally.json.lock").exists());
    }

    #[tokio::test]
    async fn test_update_can_keep_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        store.write("k", &json!([1])).await.unwrap();
        let before = std::fs::read(store.path_for("k")).unwrap();

        let kept: Option<Vec<u32>> = store.update_as("k", |_| None).await.unwrap();

        assert_eq!(kept, Some(vec![1]));
        assert_eq!(std::fs::read(store.path_for("k")).unwrap(), before);
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        let lock = dir.path().join(".k.json.lock");
        let file = std::fs::File::create(&lock).unwrap();
        file.set_modified(std::time::SystemTime::now() - Duration::from_secs(120))
            .unwrap();

        let stored: Option<u32> = store.update_as("k", |_| Some(7)).await.unwrap();

        assert_eq!(stored, Some(7));
        assert!(!lock.exists());
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::open(dir.path()).await.unwrap();
        store.write("x", &json!(1)).await.unwrap();

        assert!(store.remove("x").await.unwrap());
        assert!(!store.remove("x").await.unwrap());
    }
}

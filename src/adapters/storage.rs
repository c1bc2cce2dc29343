//! Object stores for staged artifacts.
//!
//! [`FsObjectStore`] maps buckets to directories under a root and makes every
//! write an atomic replace (temp file + rename in the same directory).
//! [`MemoryObjectStore`] keeps objects in a map; it backs tests and dry runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use super::StagesArtifacts;
use crate::domain::{ArtifactKey, StagingAck};
use crate::error::StorageError;

/// Filesystem-backed object store
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `bucket`/`key` to a path, refusing anything that escapes the root
    pub fn object_path(&self, bucket: &str, key: &ArtifactKey) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains(['/', '\\']) {
            return Err(StorageError::InvalidBucket {
                bucket: bucket.to_string(),
                reason: "must be a single non-empty path segment",
            });
        }

        let key_ok = key
            .as_str()
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

        if !key_ok {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "must be a relative path without '.' or '..' segments",
            });
        }

        Ok(self.root.join(bucket).join(key.as_str()))
    }

    /// Read an object back, `None` if it was never written
    pub async fn get(&self, bucket: &str, key: &ArtifactKey) -> Result<Option<Bytes>, StorageError> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[async_trait]
impl StagesArtifacts for FsObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &ArtifactKey,
        content: Bytes,
    ) -> Result<StagingAck, StorageError> {
        let path = self.object_path(bucket, key)?;
        // object_path guarantees at least bucket + one key segment
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&parent)
            .await
            .map_err(|source| StorageError::Io {
                path: parent.clone(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

        if let Err(source) = fs::write(&temp_path, &content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io { path, source });
        }

        debug!(path = %path.display(), bytes = content.len(), "Object written");
        Ok(StagingAck::for_content(bucket, key, &content))
    }
}

/// In-memory object store.
///
/// Thread-safe via `Mutex`. Records the number of writes for assertions.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    puts: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of an object
    pub fn get(&self, bucket: &str, key: &ArtifactKey) -> Option<Bytes> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of objects currently stored
    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put` calls received, failed ones included
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Make every subsequent `put` fail with `message`; `None` restores writes
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = message.map(str::to_string);
        }
    }
}

#[async_trait]
impl StagesArtifacts for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &ArtifactKey,
        content: Bytes,
    ) -> Result<StagingAck, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .failure
            .lock()
            .map_err(|_| StorageError::Unavailable("lock poisoned".into()))?
            .clone();
        if let Some(message) = failure {
            return Err(StorageError::Unavailable(message));
        }

        let ack = StagingAck::for_content(bucket, key, &content);
        self.objects
            .lock()
            .map_err(|_| StorageError::Unavailable("lock poisoned".into()))?
            .insert((bucket.to_string(), key.to_string()), content);

        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_layout() {
        let store = FsObjectStore::new("/data");
        let key = ArtifactKey::for_project("ip-demo", "v1");

        assert_eq!(
            store.object_path("mlops-cicd-source", &key).unwrap(),
            PathBuf::from("/data/mlops-cicd-source/ip-demo/v1/source.zip")
        );
    }

    #[test]
    fn test_object_path_rejects_escape() {
        let store = FsObjectStore::new("/data");

        for key in ["../outside.zip", "/abs/source.zip", "a/./b", "", "dir/"] {
            let result = store.object_path("bucket", &ArtifactKey::from_raw(key));
            assert!(
                matches!(result, Err(StorageError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }

        for bucket in ["", "..", "a/b"] {
            let result = store.object_path(bucket, &ArtifactKey::from_raw("k"));
            assert!(matches!(result, Err(StorageError::InvalidBucket { .. })));
        }
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryObjectStore::new();
        let key = ArtifactKey::for_project("p", "v1");

        store.set_failure(Some("quota exceeded"));
        let err = store.put("b", &key, Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(store.is_empty());

        store.set_failure(None);
        store.put("b", &key, Bytes::from_static(b"x")).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_count(), 2);
    }
}

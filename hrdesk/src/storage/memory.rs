//! In-process object store.

use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::HashMap, sync::RwLock, time::Duration};

use super::{ObjectMetadata, ObjectStore, StorageError, attachment_disposition};

/// Object store that keeps objects in memory.
///
/// Presigned URLs use a `memory://` scheme and cannot be dereferenced over HTTP; uploads are
/// simulated with [`MemoryObjectStore::put_object`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Store an object as if a client had used a presigned upload URL
    pub fn put_object(&self, key: &str, body: impl Into<Bytes>) {
        self.write().insert(key.to_string(), body.into());
    }

    /// Whether an object currently exists under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Bytes>> {
        self.objects.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Bytes>> {
        self.objects.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn url(&self, key: &str, method: &'static str, expires_in: Duration, extra: &[(&str, &str)]) -> Result<String, StorageError> {
        let mut url = url::Url::parse(&format!("memory://{}/{}", self.bucket, key)).map_err(|e| StorageError::Presign {
            operation: method,
            key: key.to_string(),
            message: e.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("x-method", method);
            query.append_pair("x-expires-in", &expires_in.as_secs().to_string());
            for (name, value) in extra {
                query.append_pair(name, value);
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn presign_upload(&self, key: &str, content_type: &str, expires_in: Duration) -> Result<String, StorageError> {
        self.url(key, "PUT", expires_in, &[("content-type", content_type)])
    }

    async fn presign_download(&self, key: &str, download_name: &str, expires_in: Duration) -> Result<String, StorageError> {
        let disposition = attachment_disposition(download_name);
        self.url(key, "GET", expires_in, &[("response-content-disposition", &disposition)])
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError> {
        Ok(self.read().get(key).map(|body| ObjectMetadata { size: body.len() as i64 }))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.write().remove(key);
        Ok(())
    }
}

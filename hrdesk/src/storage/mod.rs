//! Object storage abstraction for document files.
//!
//! Document bytes never pass through the API server. Clients upload and download directly against
//! the object store using short-lived presigned URLs, and the server only verifies and deletes
//! objects. This module defines the [`ObjectStore`] trait and its implementations:
//!
//! - [`S3ObjectStore`]: AWS S3 or any S3-compatible store (MinIO, R2, ...)
//! - [`MemoryObjectStore`]: in-process store for development and tests

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

/// Errors raised by object storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The presigning configuration or request was rejected before any network call
    #[error("Failed to presign {operation} request for {key}: {message}")]
    Presign {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// The storage backend returned an error
    #[error("Object storage {operation} failed for {key}")]
    Backend {
        operation: &'static str,
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Metadata returned when probing an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Object size in bytes
    pub size: i64,
}

/// Object storage operations used by the document workflow
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a URL the client can PUT the object to until `expires_in` elapses
    async fn presign_upload(&self, key: &str, content_type: &str, expires_in: Duration) -> Result<String, StorageError>;

    /// Issue a URL the client can GET the object from, served as an attachment named `download_name`
    async fn presign_download(&self, key: &str, download_name: &str, expires_in: Duration) -> Result<String, StorageError>;

    /// Probe an object. Returns `None` when it does not exist.
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, StorageError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Build the object store selected by configuration
pub async fn create_object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::S3 => Ok(Arc::new(S3ObjectStore::new(config).await?)),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object storage; uploaded documents are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new(&config.bucket)))
        }
    }
}

/// RFC 5987 `attr-char`: bytes outside this set are percent-encoded in `filename*`
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Build a `Content-Disposition` value that downloads the object as `file_name`.
///
/// The quoted `filename` parameter escapes quotes and backslashes for legacy clients, and
/// `filename*` carries the exact UTF-8 name percent-encoded.
pub fn attachment_disposition(file_name: &str) -> String {
    let mut quoted = String::with_capacity(file_name.len());
    for c in file_name.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }

    format!("attachment; filename=\"{quoted}\"; filename*=UTF-8''{}", utf8_percent_encode(file_name, ATTR_CHAR))
}
